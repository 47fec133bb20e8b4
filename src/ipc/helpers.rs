use crate::ipc::error::{err, ok};
use crate::reconcile::ReasonKind;
use serde::Serialize;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn reply(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_reason(params: &serde_json::Value) -> Result<ReasonKind, HandlerErr> {
    let raw = get_required_str(params, "reason")?;
    ReasonKind::parse(&raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown reason: {}", raw),
        details: Some(serde_json::json!({
            "expected": ReasonKind::ALL.iter().map(|k| k.key()).collect::<Vec<_>>()
        })),
    })
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

/// `classIds` as an array of strings; `None` when the key is absent.
pub fn get_class_ids(params: &serde_json::Value) -> Result<Option<Vec<String>>, HandlerErr> {
    let Some(v) = params.get("classIds") else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(items) = v.as_array() else {
        return Err(HandlerErr::bad_params("classIds must be an array"));
    };
    Ok(Some(
        items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
    ))
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "serialize_failed",
        message: e.to_string(),
        details: None,
    })
}

pub fn row_not_open(class_id: &str) -> HandlerErr {
    HandlerErr {
        code: "not_found",
        message: "class row is not open".to_string(),
        details: Some(serde_json::json!({ "classId": class_id })),
    }
}
