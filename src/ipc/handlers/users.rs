use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing {}", key))
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let fields = ["firstName", "lastName", "email", "phone"]
        .iter()
        .map(|k| get_required_str(&req.params, *k))
        .collect::<Result<Vec<_>, _>>();
    let fields = match fields {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let [first_name, last_name, email, phone] = match <[String; 4]>::try_from(fields) {
        Ok(v) => v,
        Err(_) => return err(&req.id, "bad_params", "missing fields", None),
    };
    let email = email.to_ascii_lowercase();

    let user_id = Uuid::new_v4().to_string();
    let result = conn.execute(
        "INSERT INTO users(id, first_name, last_name, email, phone, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &user_id,
            &first_name,
            &last_name,
            &email,
            &phone,
            Utc::now().to_rfc3339(),
        ),
    );
    if let Err(e) = result {
        if let rusqlite::Error::SqliteFailure(f, _) = &e {
            if f.code == ErrorCode::ConstraintViolation {
                return err(&req.id, "email_taken", "user already exists", None);
            }
        }
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "firstName": first_name,
            "lastName": last_name,
            "email": email
        }),
    )
}

fn handle_users_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match get_required_str(&req.params, "userId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let row = conn
        .query_row(
            "SELECT first_name, last_name, email, phone FROM users WHERE id = ?",
            [&user_id],
            |r| {
                Ok(json!({
                    "userId": user_id.clone(),
                    "firstName": r.get::<_, String>(0)?,
                    "lastName": r.get::<_, String>(1)?,
                    "email": r.get::<_, String>(2)?,
                    "phone": r.get::<_, String>(3)?
                }))
            },
        )
        .optional();

    match row {
        Ok(Some(user)) => ok(&req.id, user),
        Ok(None) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(handle_users_create(state, req)),
        "users.get" => Some(handle_users_get(state, req)),
        _ => None,
    }
}
