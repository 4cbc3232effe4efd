use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};
use crate::sync::{self, SlotInput, SyncError};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

enum HandlerErr {
    Bad(&'static str, String),
    Sync(SyncError),
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        match self {
            HandlerErr::Bad(code, message) => err(id, code, message, None),
            HandlerErr::Sync(e) => sync_err(id, &e),
        }
    }
}

impl From<SyncError> for HandlerErr {
    fn from(e: SyncError) -> Self {
        HandlerErr::Sync(e)
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::Bad("bad_params", format!("missing {}", key)))
}

fn require_user(conn: &Connection, user_id: &str) -> Result<(), HandlerErr> {
    let exists = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(|e| HandlerErr::Bad("db_query_failed", e.to_string()))?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(HandlerErr::Bad("not_found", "user not found".to_string()))
    }
}

fn slots_json(slots: &[sync::Slot]) -> serde_json::Value {
    serde_json::to_value(slots).unwrap_or_else(|_| json!([]))
}

fn slots_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    require_user(conn, &user_id)?;
    let slots = sync::list_for_owner(conn, &user_id)?;
    Ok(json!({ "slots": slots_json(&slots) }))
}

fn slots_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    require_user(conn, &user_id)?;
    let input: SlotInput = params
        .get("input")
        .cloned()
        .ok_or_else(|| HandlerErr::Bad("bad_params", "missing input".to_string()))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| HandlerErr::Bad("bad_params", format!("invalid input: {}", e)))
        })?;
    let slot = sync::create_one(conn, &user_id, &input)?;
    Ok(json!({ "slot": serde_json::to_value(&slot).unwrap_or_default() }))
}

fn slots_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let slot_id = get_required_str(params, "slotId")?;
    require_user(conn, &user_id)?;
    sync::delete_one(conn, &user_id, &slot_id)?;
    Ok(json!({ "slotId": slot_id }))
}

fn slots_replace_all(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    require_user(conn, &user_id)?;
    let inputs: Vec<SlotInput> = params
        .get("slots")
        .cloned()
        .ok_or_else(|| HandlerErr::Bad("bad_params", "missing slots".to_string()))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|e| HandlerErr::Bad("bad_params", format!("invalid slots: {}", e)))
        })?;
    let slots = sync::replace_all(conn, &user_id, &inputs)?;
    Ok(json!({ "slots": slots_json(&slots) }))
}

fn with_db(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "slots.list" => Some(with_db(state, req, slots_list)),
        "slots.create" => Some(with_db(state, req, slots_create)),
        "slots.delete" => Some(with_db(state, req, slots_delete)),
        "slots.replaceAll" => Some(with_db(state, req, slots_replace_all)),
        _ => None,
    }
}
