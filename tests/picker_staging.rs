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

fn picker_id(opened: &serde_json::Value) -> String {
    opened["pickerId"].as_str().expect("pickerId").to_string()
}

#[test]
fn reason_picker_stages_until_confirm() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    load_roster(&mut stdin, &mut reader, "9A", 30);
    let _ = request_ok(&mut stdin, &mut reader, "1", "row.open", json!({ "classId": "9A" }));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "picker.open",
        json!({ "classId": "9A", "target": "family" }),
    );
    assert_eq!(opened["items"].as_array().expect("items").len(), 8);
    assert!(opened.get("hint").is_none());
    let pid = picker_id(&opened);

    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "picker.toggle",
        json!({ "pickerId": pid, "studentId": 5, "checked": true }),
    );
    assert_eq!(toggled["applied"], json!(true));
    assert_eq!(ids_at(&toggled, &["selectedIds"]), vec![5]);

    // Staged only: the row is untouched.
    let row = request_ok(&mut stdin, &mut reader, "4", "row.get", json!({ "classId": "9A" }));
    assert!(ids_at(&row, &["state", "reasonSets", "family"]).is_empty());

    let committed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "picker.confirm",
        json!({ "pickerId": pid }),
    );
    assert_eq!(ids_at(&committed, &["state", "reasonSets", "family"]), vec![5]);
    assert_eq!(committed["committed"]["target"], json!("family"));

    let again = request(
        &mut stdin,
        &mut reader,
        "6",
        "picker.confirm",
        json!({ "pickerId": pid }),
    );
    assert_eq!(again["error"]["code"], json!("not_found"));
}

#[test]
fn cancelled_picker_does_not_mutate() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    load_roster(&mut stdin, &mut reader, "9A", 30);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "row.open",
        json!({ "classId": "9A", "unexcused": "1,2" }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "picker.open",
        json!({ "classId": "9A", "target": "illnessA" }),
    );
    let pid = picker_id(&opened);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "picker.toggle",
        json!({ "pickerId": pid, "studentId": 1, "checked": true }),
    );
    let cancelled = request_ok(&mut stdin, &mut reader, "4", "picker.cancel", json!({ "pickerId": pid }));
    assert_eq!(cancelled["cancelled"], json!(true));

    let row = request_ok(&mut stdin, &mut reader, "5", "row.get", json!({ "classId": "9A" }));
    assert_eq!(ids_at(&row, &["state", "reasonSets", "unexcused"]), vec![1, 2]);
    assert!(ids_at(&row, &["state", "reasonSets", "illnessA"]).is_empty());
}

#[test]
fn union_picker_is_removal_only() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    load_roster(&mut stdin, &mut reader, "9A", 30);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "row.open",
        json!({ "classId": "9A", "unexcused": "1,3", "illnessA": "2,4" }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "picker.open",
        json!({ "classId": "9A", "target": "all" }),
    );
    assert!(opened["hint"].as_str().is_some());
    let disabled: Vec<u64> = opened["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter(|i| i["disabled"] == json!(true))
        .map(|i| i["id"].as_u64().expect("id"))
        .collect();
    assert_eq!(disabled, vec![5, 6, 7, 8]);
    let pid = picker_id(&opened);

    let refused = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "picker.toggle",
        json!({ "pickerId": pid, "studentId": 6, "checked": true }),
    );
    assert_eq!(refused["applied"], json!(false));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "picker.toggle",
        json!({ "pickerId": pid, "studentId": 3, "checked": false }),
    );

    let committed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "picker.confirm",
        json!({ "pickerId": pid }),
    );
    assert_eq!(ids_at(&committed, &["state", "reasonSets", "unexcused"]), vec![1]);
    assert_eq!(ids_at(&committed, &["committed", "removedIds"]), vec![3]);
    let mut union = ids_at(&committed, &["state", "allAbsent"]);
    union.sort();
    assert_eq!(union, vec![1, 2, 4]);
}

#[test]
fn confirm_with_explicit_selection_replaces_staged() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    load_roster(&mut stdin, &mut reader, "9A", 30);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "row.open",
        json!({ "classId": "9A", "unexcused": "1,2,3" }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "picker.open",
        json!({ "classId": "9A", "target": "illnessOther" }),
    );
    let committed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "picker.confirm",
        json!({ "pickerId": picker_id(&opened), "selectedIds": ["3", "None", 4] }),
    );
    assert_eq!(ids_at(&committed, &["state", "reasonSets", "illnessOther"]), vec![3, 4]);
    assert_eq!(ids_at(&committed, &["state", "reasonSets", "unexcused"]), vec![1, 2]);
    assert_eq!(ids_at(&committed, &["committed", "movedIds"]), vec![3]);
}

#[test]
fn closing_row_abandons_its_pickers() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    load_roster(&mut stdin, &mut reader, "9A", 30);
    let _ = request_ok(&mut stdin, &mut reader, "1", "row.open", json!({ "classId": "9A" }));
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "picker.open",
        json!({ "classId": "9A", "target": "unexcused" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "3", "row.close", json!({ "classId": "9A" }));
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "picker.confirm",
        json!({ "pickerId": picker_id(&opened), "selectedIds": [1] }),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("not_found"));
    let health = request_ok(&mut stdin, &mut reader, "5", "health", json!({}));
    assert_eq!(health["openPickers"], json!(0));
}

#[test]
fn bad_picker_params_are_rejected() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(&mut stdin, &mut reader, "1", "row.open", json!({ "classId": "9A" }));
    let bad_target = request(
        &mut stdin,
        &mut reader,
        "2",
        "picker.open",
        json!({ "classId": "9A", "target": "everyone" }),
    );
    assert_eq!(bad_target["error"]["code"], json!("bad_params"));
    let bad_id = request(
        &mut stdin,
        &mut reader,
        "3",
        "picker.cancel",
        json!({ "pickerId": "not-a-uuid" }),
    );
    assert_eq!(bad_id["error"]["code"], json!("bad_params"));
}
