use crate::ids::{ids_from_json, parse_count_text, IdSet};
use crate::ipc::helpers::{
    get_optional_i64, get_reason, get_required_str, reply, row_not_open, to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::reconcile::{PerReason, PersistedRow, ReasonKind};
use chrono::NaiveDate;
use log::warn;
use serde_json::json;

fn parse_date(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match params.get("date").and_then(|v| v.as_str()) {
        None => Ok(chrono::Local::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD")),
    }
}

fn persisted_from_params(params: &serde_json::Value) -> PersistedRow {
    PersistedRow {
        reason_sets: PerReason::from_fn(|k: ReasonKind| ids_from_json(params.get(k.key()))),
        all_absent: ids_from_json(params.get("allAbsent")),
    }
}

/// Typed count text or a JSON number; anything unparseable reads as 0.
fn parse_count_value(v: Option<&serde_json::Value>) -> Result<i64, HandlerErr> {
    match v {
        None => Err(HandlerErr::bad_params("missing value")),
        Some(serde_json::Value::Null) => Ok(0),
        Some(serde_json::Value::String(s)) => Ok(parse_count_text(s)),
        Some(serde_json::Value::Number(n)) => Ok(n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0)),
        Some(_) => Err(HandlerErr::bad_params("value must be a number or string")),
    }
}

fn row_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = parse_date(params)?;
    let total_students = get_optional_i64(params, "totalStudents")?;
    if total_students.is_some_and(|t| t < 0) {
        return Err(HandlerErr::bad_params("totalStudents must not be negative"));
    }
    if !state.reconciler.has_roster(&class_id) {
        warn!("event=row_open class_id={} status=no_roster", class_id);
    }
    let view = state.reconciler.open_row(
        &class_id,
        date,
        total_students,
        persisted_from_params(params),
    );
    to_json(&view)
}

fn row_get(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let view = state
        .reconciler
        .view(&class_id)
        .ok_or_else(|| row_not_open(&class_id))?;
    to_json(&view)
}

fn row_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let form = state
        .reconciler
        .close_row(&class_id)
        .ok_or_else(|| row_not_open(&class_id))?;
    Ok(json!({
        "classId": class_id,
        "form": to_json(&form)?,
    }))
}

fn reasons_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let kind = get_reason(params)?;
    if params.get("ids").is_none() {
        return Err(HandlerErr::bad_params("missing ids"));
    }
    let candidate = ids_from_json(params.get("ids"));
    let view = state
        .reconciler
        .replace_reason(&class_id, kind, candidate)
        .ok_or_else(|| row_not_open(&class_id))?;
    to_json(&view)
}

fn union_apply(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    if params.get("ids").is_none() {
        return Err(HandlerErr::bad_params("missing ids"));
    }
    let candidate = ids_from_json(params.get("ids"));
    let before: Option<IdSet> = params
        .get("allBeforeOpen")
        .filter(|v| !v.is_null())
        .map(|v| ids_from_json(Some(v)));
    let (view, out) = state
        .reconciler
        .apply_union(&class_id, &candidate, before.as_ref())
        .ok_or_else(|| row_not_open(&class_id))?;
    let mut result = to_json(&view)?;
    result["union"] = json!({
        "removedIds": out.removed,
        "rejectedIds": out.rejected,
    });
    Ok(result)
}

fn count_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let kind = get_reason(params)?;
    let value = parse_count_value(params.get("value"))?;
    let view = state
        .reconciler
        .set_count(&class_id, kind, value)
        .ok_or_else(|| row_not_open(&class_id))?;
    to_json(&view)
}

fn handle_row_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, row_open(state, &req.params))
}

fn handle_row_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, row_get(state, &req.params))
}

fn handle_row_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, row_close(state, &req.params))
}

fn handle_reasons_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, reasons_set(state, &req.params))
}

fn handle_union_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, union_apply(state, &req.params))
}

fn handle_count_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, count_set(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "row.open" => Some(handle_row_open(state, req)),
        "row.get" => Some(handle_row_get(state, req)),
        "row.close" => Some(handle_row_close(state, req)),
        "reasons.set" => Some(handle_reasons_set(state, req)),
        "union.apply" => Some(handle_union_apply(state, req)),
        "count.set" => Some(handle_count_set(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_value_accepts_typed_text_and_numbers() {
        assert_eq!(parse_count_value(Some(&json!("5"))).ok(), Some(5));
        assert_eq!(parse_count_value(Some(&json!(""))).ok(), Some(0));
        assert_eq!(parse_count_value(Some(&json!(-2))).ok(), Some(-2));
        assert_eq!(parse_count_value(Some(&json!(3.9))).ok(), Some(3));
        assert_eq!(parse_count_value(Some(&json!(null))).ok(), Some(0));
        assert!(parse_count_value(None).is_err());
        assert!(parse_count_value(Some(&json!([1]))).is_err());
    }

    #[test]
    fn persisted_lists_are_sanitized() {
        let p = persisted_from_params(&json!({
            "unexcused": "1,None,2",
            "illnessA": [3, "x"],
            "allAbsent": "1,2,3"
        }));
        assert_eq!(p.reason_sets.unexcused.join(), "1,2");
        assert_eq!(p.reason_sets.illness_a.join(), "3");
        assert!(p.reason_sets.family.is_empty());
        assert_eq!(p.all_absent.join(), "1,2,3");
    }
}
