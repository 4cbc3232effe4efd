use crate::calendar;
use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};
use crate::sync;
use serde_json::json;

/// Month view for the date picker: the pure batch plan, plus the owner's
/// already-booked days when a userId is supplied. The overlay is a display
/// aid; selectability itself never depends on persisted state.
fn handle_month_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(year) = req.params.get("year").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing year", None);
    };
    let Some(month) = req.params.get("month").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing month", None);
    };
    if !(1..=12).contains(&month) {
        return err(&req.id, "bad_params", "month must be between 1 and 12", None);
    }
    let Ok(year) = i32::try_from(year) else {
        return err(&req.id, "bad_params", "year out of range", None);
    };
    let month = month as u32;

    let plan = calendar::month_plan(year, month);

    let mut booked_days: Vec<u32> = Vec::new();
    if let Some(user_id) = req.params.get("userId").and_then(|v| v.as_str()) {
        let slots = match sync::list_for_owner(conn, user_id) {
            Ok(v) => v,
            Err(e) => return sync_err(&req.id, &e),
        };
        let prefix = format!("{:04}-{:02}-", year, month);
        for slot in &slots {
            if let Some(day) = slot
                .date
                .strip_prefix(&prefix)
                .and_then(|d| d.parse::<u32>().ok())
            {
                booked_days.push(day);
            }
        }
    }

    ok(
        &req.id,
        json!({
            "year": plan.year,
            "month": plan.month,
            "daysInMonth": plan.days_in_month,
            "days": serde_json::to_value(&plan.days).unwrap_or_else(|_| json!([])),
            "bookedDays": booked_days
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.monthOpen" => Some(handle_month_open(state, req)),
        _ => None,
    }
}
