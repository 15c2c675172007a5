mod test_support;

use serde_json::json;
use test_support::{count_events, request_err_code, request_ok, seed_workspace, spawn_sidecar, temp_dir, CLASSROOM, DATE};

#[test]
fn create_advance_submit_then_edit_period() {
    let workspace = temp_dir("periodd-session-flow");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_workspace(&mut stdin, &mut reader, &workspace);

    let roster = request_ok(&mut stdin, &mut reader, "1", "roster.mine", json!({}));
    assert_eq!(
        roster.pointer("/roster/students").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(3)
    );

    let auto = request_ok(&mut stdin, &mut reader, "2", "mapping.autoconfigure", json!({}));
    assert_eq!(
        auto.pointer("/mapping/point.score10").and_then(|v| v.as_str()),
        Some("et-score10")
    );
    assert_eq!(
        auto.pointer("/mapping/lesson.good").and_then(|v| v.as_str()),
        Some("et-lesson-good")
    );
    assert!(auto
        .get("unresolved")
        .and_then(|v| v.as_array())
        .expect("unresolved")
        .iter()
        .any(|k| k.as_str() == Some("lesson.poor")));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.open",
        json!({ "classroomId": CLASSROOM, "date": DATE }),
    );
    assert_eq!(opened.get("mode").and_then(|v| v.as_str()), Some("create"));
    assert_eq!(opened.get("currentPeriod").and_then(|v| v.as_u64()), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "matrix.selectLessonRating",
        json!({ "period": 1, "rating": "good" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "matrix.addPointRow",
        json!({ "period": 1, "column": "score10", "studentId": "s1", "note": "proof by induction" }),
    );
    let adjusted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "matrix.adjustClassViolation",
        json!({ "period": 1, "kind": "noisyClass", "delta": 2 }),
    );
    assert_eq!(adjusted.pointer("/result/count").and_then(|v| v.as_u64()), Some(2));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "matrix.addStudentViolationRow",
        json!({ "period": 1, "studentId": "s2", "kind": "noScarf" }),
    );

    let preview = request_ok(&mut stdin, &mut reader, "8", "matrix.preview", json!({ "period": 1 }));
    let events = preview
        .pointer("/periods/0/output/events")
        .and_then(|v| v.as_array())
        .expect("preview events");
    assert_eq!(events.len(), 5);
    assert!(events.iter().any(|e| {
        e.get("eventTypeId").and_then(|v| v.as_str()) == Some("et-score10")
            && e.get("points").and_then(|v| v.as_i64()) == Some(10)
            && e.get("description").and_then(|v| v.as_str()) == Some("proof by induction")
    }));

    let advanced = request_ok(&mut stdin, &mut reader, "9", "workflow.advance", json!({}));
    assert_eq!(
        advanced.pointer("/transition/commit/result/strategy").and_then(|v| v.as_str()),
        Some("bulkCreate")
    );
    assert_eq!(
        advanced.pointer("/transition/currentPeriod").and_then(|v| v.as_u64()),
        Some(2)
    );
    assert_eq!(count_events(&mut stdin, &mut reader, "10", Some(1)), 5);

    // coming back to a saved period and advancing again writes nothing
    let _ = request_ok(&mut stdin, &mut reader, "11", "workflow.retreat", json!({}));
    let again = request_ok(&mut stdin, &mut reader, "12", "workflow.advance", json!({}));
    assert_eq!(
        again.pointer("/transition/commit/skipped").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(count_events(&mut stdin, &mut reader, "13", Some(1)), 5);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "matrix.selectLessonRating",
        json!({ "period": 3, "rating": "excellent" }),
    );
    let submitted = request_ok(&mut stdin, &mut reader, "15", "workflow.submitAll", json!({}));
    assert_eq!(
        submitted.pointer("/summary/saved/0/period").and_then(|v| v.as_u64()),
        Some(3)
    );
    assert_eq!(submitted.pointer("/summary/unchanged"), Some(&json!([1])));
    assert_eq!(
        submitted.pointer("/session/currentPeriod").and_then(|v| v.as_u64()),
        Some(1)
    );
    assert_eq!(count_events(&mut stdin, &mut reader, "16", None), 6);

    let editing = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "session.open",
        json!({ "classroomId": CLASSROOM, "date": DATE, "mode": "edit", "period": 1 }),
    );
    assert_eq!(editing.get("mode").and_then(|v| v.as_str()), Some("edit"));
    let entry = editing.pointer("/periods/0/entry").expect("period 1 entry");
    assert_eq!(entry.get("lessonRating").and_then(|v| v.as_str()), Some("good"));
    assert_eq!(
        entry.pointer("/pointSelections/score10/0/note").and_then(|v| v.as_str()),
        Some("proof by induction")
    );
    assert_eq!(
        entry.pointer("/classViolationCounts/noisyClass").and_then(|v| v.as_u64()),
        Some(2)
    );
    assert_eq!(
        editing.pointer("/periods/2/entry/lessonRating").and_then(|v| v.as_str()),
        Some("excellent")
    );

    let locked = request_err_code(
        &mut stdin,
        &mut reader,
        "18",
        "matrix.adjustClassViolation",
        json!({ "period": 3, "kind": "lateStart", "delta": 1 }),
    );
    assert_eq!(locked, "period_locked");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "matrix.adjustClassViolation",
        json!({ "period": 1, "kind": "noisyClass", "delta": -5 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "matrix.removeStudentViolationRow",
        json!({ "period": 1, "index": 0 }),
    );
    let saved = request_ok(&mut stdin, &mut reader, "21", "workflow.saveEdit", json!({}));
    assert_eq!(
        saved.pointer("/transition/commit/result/strategy").and_then(|v| v.as_str()),
        Some("diffSync")
    );
    assert_eq!(
        saved.pointer("/transition/commit/result/deleted").and_then(|v| v.as_u64()),
        Some(3)
    );
    assert_eq!(saved.pointer("/session/mode").and_then(|v| v.as_str()), Some("create"));
    assert_eq!(count_events(&mut stdin, &mut reader, "22", Some(1)), 2);
    assert_eq!(count_events(&mut stdin, &mut reader, "23", Some(3)), 1);

    let approved = request_ok(
        &mut stdin,
        &mut reader,
        "24",
        "events.bulkApprove",
        json!({ "classroomId": CLASSROOM, "date": DATE }),
    );
    assert_eq!(approved.get("approvedCount").and_then(|v| v.as_u64()), Some(3));
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "25",
        "events.list",
        json!({ "classroomId": CLASSROOM, "date": DATE }),
    );
    assert!(listed
        .get("events")
        .and_then(|v| v.as_array())
        .expect("events")
        .iter()
        .all(|e| e.get("status").and_then(|v| v.as_str()) == Some("approved")));
}

#[test]
fn reopening_in_create_mode_resumes_without_duplicates() {
    let workspace = temp_dir("periodd-session-resume");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_workspace(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(&mut stdin, &mut reader, "1", "mapping.autoconfigure", json!({}));

    let open = json!({ "classroomId": CLASSROOM, "date": DATE });
    let _ = request_ok(&mut stdin, &mut reader, "2", "session.open", open.clone());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "matrix.selectLessonRating",
        json!({ "period": 2, "rating": "good" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "matrix.addPointRow",
        json!({ "period": 2, "column": "volunteered", "studentId": "s3" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "5", "workflow.submitAll", json!({}));
    assert_eq!(count_events(&mut stdin, &mut reader, "6", None), 2);

    let reopened = request_ok(&mut stdin, &mut reader, "7", "session.open", open);
    assert_eq!(reopened.pointer("/completed/1").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(reopened.pointer("/persistedCounts/1").and_then(|v| v.as_u64()), Some(2));

    // a second volunteer in the same period goes through the diffing path
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "matrix.addPointRow",
        json!({ "period": 2, "column": "volunteered", "studentId": "s1" }),
    );
    let summary = request_ok(&mut stdin, &mut reader, "9", "workflow.submitAll", json!({}));
    assert_eq!(
        summary.pointer("/summary/saved/0/strategy").and_then(|v| v.as_str()),
        Some("diffSync")
    );
    assert_eq!(
        summary.pointer("/summary/saved/0/created").and_then(|v| v.as_u64()),
        Some(1)
    );
    assert_eq!(count_events(&mut stdin, &mut reader, "10", None), 3);
}
