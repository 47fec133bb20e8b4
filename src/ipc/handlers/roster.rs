use crate::ids::{json_scalar_id, StudentId};
use crate::ipc::helpers::{get_optional_i64, get_required_str, reply, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn roster_load(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let Some(students_json) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing students"));
    };
    let total_students = get_optional_i64(params, "totalStudents")?;
    if total_students.is_some_and(|t| t < 0) {
        return Err(HandlerErr::bad_params("totalStudents must not be negative"));
    }

    // Rows without a usable id or name are skipped, not rejected.
    let entries: Vec<(StudentId, String)> = students_json
        .iter()
        .filter_map(|s| {
            let id = s.get("id").and_then(json_scalar_id)?;
            let name = s.get("name").and_then(|v| v.as_str())?;
            Some((id, name.to_string()))
        })
        .collect();
    let received = students_json.len();
    let kept = state
        .reconciler
        .load_roster(&class_id, entries, total_students);

    Ok(json!({
        "classId": class_id,
        "students": kept,
        "skipped": received - kept,
        "totalStudents": total_students.unwrap_or(kept as i64),
    }))
}

fn handle_roster_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, roster_load(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.load" => Some(handle_roster_load(state, req)),
        _ => None,
    }
}
