use crate::ids::{ids_from_json, json_scalar_id};
use crate::ipc::helpers::{get_required_str, reply, row_not_open, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::picker::{Committed, PickerTarget};
use crate::reconciler::PickerError;
use serde_json::json;
use uuid::Uuid;

fn get_picker_id(params: &serde_json::Value) -> Result<Uuid, HandlerErr> {
    let raw = get_required_str(params, "pickerId")?;
    Uuid::parse_str(raw.trim()).map_err(|_| HandlerErr::bad_params("pickerId must be a uuid"))
}

fn unknown_picker(picker_id: &Uuid) -> HandlerErr {
    HandlerErr {
        code: "not_found",
        message: "picker session not found".to_string(),
        details: Some(json!({ "pickerId": picker_id.to_string() })),
    }
}

fn picker_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let raw_target = get_required_str(params, "target")?;
    let target = PickerTarget::parse(&raw_target)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown target: {}", raw_target)))?;
    let opened = state
        .reconciler
        .open_picker(&class_id, target)
        .ok_or_else(|| row_not_open(&class_id))?;
    to_json(&opened)
}

fn picker_toggle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let picker_id = get_picker_id(params)?;
    let student = params
        .get("studentId")
        .and_then(json_scalar_id)
        .ok_or_else(|| HandlerErr::bad_params("studentId must be a positive integer"))?;
    let checked = params
        .get("checked")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params("missing checked"))?;
    let (applied, staged) = state
        .reconciler
        .toggle_picker(&picker_id, student, checked)
        .ok_or_else(|| unknown_picker(&picker_id))?;
    Ok(json!({
        "pickerId": picker_id.to_string(),
        "applied": applied,
        "selectedIds": staged,
    }))
}

fn picker_confirm(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let picker_id = get_picker_id(params)?;
    let selected = params
        .get("selectedIds")
        .filter(|v| !v.is_null())
        .map(|v| ids_from_json(Some(v)));
    let (view, committed) = match state.reconciler.confirm_picker(&picker_id, selected) {
        Ok(v) => v,
        Err(PickerError::UnknownSession) => return Err(unknown_picker(&picker_id)),
        Err(PickerError::RowClosed) => return Err(HandlerErr::not_found("class row is not open")),
    };
    let mut result = to_json(&view)?;
    result["committed"] = match committed {
        Committed::Reason { kind, moved } => json!({
            "target": kind.key(),
            "movedIds": moved,
        }),
        Committed::Union { removed, rejected } => json!({
            "target": "all",
            "removedIds": removed,
            "rejectedIds": rejected,
        }),
    };
    Ok(result)
}

fn picker_cancel(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let picker_id = get_picker_id(params)?;
    if !state.reconciler.cancel_picker(&picker_id) {
        return Err(unknown_picker(&picker_id));
    }
    Ok(json!({ "pickerId": picker_id.to_string(), "cancelled": true }))
}

fn handle_picker_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, picker_open(state, &req.params))
}

fn handle_picker_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, picker_toggle(state, &req.params))
}

fn handle_picker_confirm(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, picker_confirm(state, &req.params))
}

fn handle_picker_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, picker_cancel(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "picker.open" => Some(handle_picker_open(state, req)),
        "picker.toggle" => Some(handle_picker_toggle(state, req)),
        "picker.confirm" => Some(handle_picker_confirm(state, req)),
        "picker.cancel" => Some(handle_picker_cancel(state, req)),
        _ => None,
    }
}
