use crate::ipc::helpers::{get_class_ids, get_required_str, reply, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn requested_or_open(state: &AppState, params: &serde_json::Value) -> Result<Vec<String>, HandlerErr> {
    Ok(get_class_ids(params)?.unwrap_or_else(|| state.reconciler.open_class_ids()))
}

fn row_is_valid(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let valid = state.reconciler.is_row_valid(&class_id);
    Ok(json!({ "classId": class_id, "valid": valid }))
}

fn rows_any_invalid(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_ids = requested_or_open(state, params)?;
    let any_invalid = state.reconciler.is_any_row_invalid(&class_ids);
    Ok(json!({ "anyInvalid": any_invalid, "checked": class_ids.len() }))
}

fn submit_check(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_ids = requested_or_open(state, params)?;
    let check = state.reconciler.submission_check(&class_ids);
    to_json(&check)
}

fn handle_row_is_valid(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, row_is_valid(state, &req.params))
}

fn handle_rows_any_invalid(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, rows_any_invalid(state, &req.params))
}

fn handle_submit_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, submit_check(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "row.isValid" => Some(handle_row_is_valid(state, req)),
        "rows.anyInvalid" => Some(handle_rows_any_invalid(state, req)),
        "submit.check" => Some(handle_submit_check(state, req)),
        _ => None,
    }
}
