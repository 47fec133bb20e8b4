use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn ids_at(v: &serde_json::Value, path: &[&str]) -> Vec<u64> {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key).unwrap_or_else(|| panic!("missing {} in {}", key, v));
    }
    cur.as_array()
        .expect("id array")
        .iter()
        .map(|x| x.as_u64().expect("numeric id"))
        .collect()
}

fn load_roster(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, class_id: &str, total: i64) {
    let students: Vec<serde_json::Value> = (1..=8)
        .map(|n| json!({ "id": n, "name": format!("Student {:02}", n) }))
        .collect();
    let _ = request_ok(
        stdin,
        reader,
        "roster",
        "roster.load",
        json!({ "classId": class_id, "students": students, "totalStudents": total }),
    );
}

#[test]
fn health_reports_version_and_counts() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
    assert_eq!(health["openRows"], json!(0));
    assert_eq!(health["openPickers"], json!(0));
}

#[test]
fn every_method_family_is_routed() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    load_roster(&mut stdin, &mut reader, "9A", 30);
    let calls = [
        ("row.open", json!({ "classId": "9A" })),
        ("row.get", json!({ "classId": "9A" })),
        ("reasons.set", json!({ "classId": "9A", "reason": "unexcused", "ids": "1" })),
        ("union.apply", json!({ "classId": "9A", "ids": [1] })),
        ("count.set", json!({ "classId": "9A", "reason": "unexcused", "value": 1 })),
        ("picker.open", json!({ "classId": "9A", "target": "family" })),
        ("row.isValid", json!({ "classId": "9A" })),
        ("rows.anyInvalid", json!({})),
        ("submit.check", json!({})),
        ("row.close", json!({ "classId": "9A" })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let _ = request_ok(&mut stdin, &mut reader, &format!("r{}", i), method, params);
    }
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "grades.export", json!({}));
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("not_implemented"));
}

#[test]
fn malformed_line_gets_bad_json_and_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("reply is json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health["openRows"], json!(0));
}

#[test]
fn roster_load_skips_bad_entries() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let loaded = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.load",
        json!({
            "classId": "9A",
            "totalStudents": 3,
            "students": [
                { "id": 1, "name": "Ana" },
                { "id": 1, "name": "Ana again" },
                { "id": 2, "name": "  " },
                { "id": "x", "name": "Nobody" },
                { "id": "3", "name": "Bo" }
            ]
        }),
    );
    assert_eq!(loaded["students"], json!(2));
    assert_eq!(loaded["skipped"], json!(3));
    assert_eq!(loaded["totalStudents"], json!(3));

    let bad = request(
        &mut stdin,
        &mut reader,
        "2",
        "roster.load",
        json!({ "classId": "9A", "students": [], "totalStudents": -4 }),
    );
    assert_eq!(bad["error"]["code"], json!("bad_params"));
}
