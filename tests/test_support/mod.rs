#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CLASSROOM: &str = "7A";
pub const DATE: &str = "2024-11-04";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_periodd");
    let mut child = Command::new(exe)
        .env_remove("PERIODD_REMOTE_URL")
        .env_remove("PERIODD_REMOTE_TOKEN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn periodd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Sends a request expected to fail and returns its error code.
pub fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

/// Selects `workspace` and seeds one classroom, three students and a small
/// event-type catalog named the way a school would name them.
pub fn seed_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "store.seed",
        json!({
            "classrooms": [{ "id": CLASSROOM, "name": "Class 7A" }],
            "students": [
                { "id": "s1", "classroomId": CLASSROOM, "displayName": "Chau" },
                { "id": "s2", "classroomId": CLASSROOM, "displayName": "An" },
                { "id": "s3", "classroomId": CLASSROOM, "displayName": "Binh" }
            ],
            "eventTypes": [
                { "id": "et-score10", "name": "Score 10 - excellent answer", "category": "study", "defaultPoints": 10 },
                { "id": "et-score9", "name": "Score 9", "category": "study", "defaultPoints": 8 },
                { "id": "et-volunteer", "name": "Volunteered to answer", "category": "study", "defaultPoints": 2 },
                { "id": "et-lesson-excellent", "name": "Excellent lesson", "category": "lesson", "defaultPoints": 10 },
                { "id": "et-lesson-good", "name": "Good lesson", "category": "lesson", "defaultPoints": 5 },
                { "id": "et-noisy", "name": "Noisy class", "category": "class_rules", "defaultPoints": -3 },
                { "id": "et-late-start", "name": "Late start", "category": "class_rules", "defaultPoints": -2 },
                { "id": "et-scarf", "name": "No scarf", "category": "attire", "defaultPoints": -1 },
                { "id": "et-talking", "name": "Talking in class", "category": "conduct", "defaultPoints": -1 }
            ],
            "operatorClassroomId": CLASSROOM
        }),
    );
}

pub fn count_events(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    period: Option<u8>,
) -> u64 {
    let mut params = json!({ "classroomId": CLASSROOM, "date": DATE });
    if let Some(p) = period {
        params["period"] = json!(p);
    }
    request_ok(stdin, reader, id, "events.count", params)
        .get("count")
        .and_then(|v| v.as_u64())
        .expect("count")
}
