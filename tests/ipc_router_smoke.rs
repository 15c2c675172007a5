mod test_support;

use serde_json::json;
use test_support::{request, request_ok, seed_workspace, spawn_sidecar, temp_dir, CLASSROOM, DATE};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("periodd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("backend").map(|v| v.is_null()).unwrap_or(false));
    seed_workspace(&mut stdin, &mut reader, &workspace);
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health.get("backend").and_then(|v| v.as_str()), Some("local"));

    let calls = vec![
        ("classrooms.list", json!({})),
        ("students.list", json!({ "classroomId": CLASSROOM })),
        ("roster.mine", json!({})),
        ("eventTypes.list", json!({})),
        ("categories.list", json!({})),
        ("mapping.get", json!({})),
        ("mapping.autoconfigure", json!({})),
        ("mapping.set", json!({ "mapping": { "lesson.good": "et-lesson-good" } })),
        ("scoring.get", json!({})),
        ("scoring.set", json!({ "table": { "volunteered": 3 } })),
        ("session.open", json!({ "classroomId": CLASSROOM, "date": DATE })),
        ("session.get", json!({})),
        ("matrix.addPointRow", json!({ "period": 1, "column": "score9", "studentId": "s1" })),
        ("matrix.updatePointRow", json!({ "period": 1, "column": "score9", "index": 0, "studentId": "s2" })),
        ("matrix.removePointRow", json!({ "period": 1, "column": "score9", "index": 0 })),
        ("matrix.selectLessonRating", json!({ "period": 1, "rating": "good" })),
        ("matrix.adjustClassViolation", json!({ "period": 1, "kind": "lateStart", "delta": 1 })),
        ("matrix.setClassViolation", json!({ "period": 1, "kind": "lateStart", "count": 3 })),
        ("matrix.addStudentViolationRow", json!({ "period": 1, "studentId": "s3", "kind": "talkingInClass" })),
        ("matrix.updateStudentViolationRow", json!({ "period": 1, "index": 0, "studentId": "s3", "kind": "noScarf" })),
        ("matrix.removeStudentViolationRow", json!({ "period": 1, "index": 0 })),
        ("matrix.preview", json!({})),
        ("matrix.clearPeriod", json!({ "period": 1 })),
        ("workflow.advance", json!({})),
        ("workflow.retreat", json!({})),
        ("workflow.enterView", json!({})),
        ("workflow.enterCreate", json!({})),
        ("workflow.enterEdit", json!({ "period": 1 })),
        ("workflow.saveEdit", json!({})),
        ("workflow.enterEdit", json!({ "period": 2 })),
        ("workflow.cancelEdit", json!({})),
        ("events.list", json!({ "classroomId": CLASSROOM, "date": DATE })),
        ("events.count", json!({ "classroomId": CLASSROOM, "date": DATE, "period": 1 })),
        ("events.bulkApprove", json!({ "classroomId": CLASSROOM, "date": DATE })),
        ("session.close", json!({})),
        ("remote.disconnect", json!({})),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let _ = request_ok(&mut stdin, &mut reader, &format!("m{}", i), method, params);
    }

    let unknown = request(&mut stdin, &mut reader, "u1", "grades.compute", json!({}));
    assert_eq!(
        unknown.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unparseable_line_gets_bad_json_and_loop_continues() {
    use std::io::{BufRead, Write};

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value.pointer("/error/code").and_then(|v| v.as_str()), Some("bad_json"));

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
}
