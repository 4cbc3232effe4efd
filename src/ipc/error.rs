use serde_json::json;

use crate::sync::SyncError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Slot operation failures carry an inconsistency flag so callers know when
/// to re-fetch authoritative state instead of retrying blindly.
pub fn sync_err(id: &str, e: &SyncError) -> serde_json::Value {
    let details = if e.may_be_inconsistent() {
        Some(json!({ "stateMayBeInconsistent": true }))
    } else {
        None
    };
    err(id, e.code(), e.message(), details)
}
