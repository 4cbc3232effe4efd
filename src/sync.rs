use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One persisted class occurrence. `(user_id, date)` is the natural key;
/// `month` and `year` are denormalized from `date` for query convenience and
/// are validated to agree with it before anything is written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub batch_number: i64,
    pub day_number: i64,
    pub topic_name: String,
    pub month: i64,
    pub year: i64,
}

/// Caller-supplied slot fields. The owner is injected by the handler from the
/// request identity, never read from the payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInput {
    pub date: String,
    pub batch_number: i64,
    pub day_number: i64,
    pub topic_name: String,
    pub month: i64,
    pub year: i64,
}

/// Failure taxonomy for slot operations. The split that matters to callers is
/// `may_be_inconsistent()`: when true, neither the pre- nor post-image can be
/// assumed current and the authoritative state must be re-fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Field out of range, unparseable date, or month/year disagreeing with
    /// the date. Rejected before any mutation.
    BadField(String),
    /// Two payload entries share a date. Rejected before any mutation.
    DuplicateInPayload(String),
    /// The (owner, date) uniqueness constraint fired at insert time.
    ConflictOnInsert,
    /// The replace transaction could not be committed.
    SyncIncomplete(String),
    NotFound,
    Unauthorized,
    /// The store is busy or locked; safe to retry reads.
    StoreUnavailable(String),
    /// Any other storage failure.
    Store(String),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::BadField(_) => "bad_params",
            SyncError::DuplicateInPayload(_) => "duplicate_in_payload",
            SyncError::ConflictOnInsert => "conflict_on_insert",
            SyncError::SyncIncomplete(_) => "sync_incomplete",
            SyncError::NotFound => "not_found",
            SyncError::Unauthorized => "unauthorized",
            SyncError::StoreUnavailable(_) => "store_unavailable",
            SyncError::Store(_) => "store_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            SyncError::BadField(m) => m.clone(),
            SyncError::DuplicateInPayload(date) => {
                format!("payload contains more than one slot for {}", date)
            }
            SyncError::ConflictOnInsert => "slot already booked for this date".to_string(),
            SyncError::SyncIncomplete(m) => format!("bulk replace did not complete: {}", m),
            SyncError::NotFound => "slot not found".to_string(),
            SyncError::Unauthorized => "not authorized".to_string(),
            SyncError::StoreUnavailable(m) => format!("store unavailable: {}", m),
            SyncError::Store(m) => m.clone(),
        }
    }

    /// True when persisted state may differ from both the pre- and post-image.
    /// SQLite rolls the replace transaction back on failure, so in this build
    /// only a failed commit is genuinely ambiguous; `ConflictOnInsert` keeps
    /// the flag for stores without rollback.
    pub fn may_be_inconsistent(&self) -> bool {
        matches!(
            self,
            SyncError::SyncIncomplete(_) | SyncError::ConflictOnInsert
        )
    }
}

fn store_err(e: rusqlite::Error) -> SyncError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) => match f.code {
            ErrorCode::ConstraintViolation => SyncError::ConflictOnInsert,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                SyncError::StoreUnavailable(e.to_string())
            }
            _ => SyncError::Store(e.to_string()),
        },
        _ => SyncError::Store(e.to_string()),
    }
}

/// Accepts a bare date or an ISO datetime; only the day matters.
fn parse_date(raw: &str) -> Result<NaiveDate, SyncError> {
    let day_part = raw.split('T').next().unwrap_or(raw).trim();
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .map_err(|_| SyncError::BadField(format!("invalid date: {}", raw)))
}

fn validate_input(input: &SlotInput) -> Result<NaiveDate, SyncError> {
    let date = parse_date(&input.date)?;
    if !(1..=3).contains(&input.batch_number) {
        return Err(SyncError::BadField(format!(
            "batchNumber must be 1..=3, got {}",
            input.batch_number
        )));
    }
    if !(1..=7).contains(&input.day_number) {
        return Err(SyncError::BadField(format!(
            "dayNumber must be 1..=7, got {}",
            input.day_number
        )));
    }
    if !(1..=12).contains(&input.month) {
        return Err(SyncError::BadField(format!(
            "month must be 1..=12, got {}",
            input.month
        )));
    }
    if input.topic_name.trim().is_empty() {
        return Err(SyncError::BadField("topicName must not be empty".to_string()));
    }
    if i64::from(date.month()) != input.month || i64::from(date.year()) != input.year {
        return Err(SyncError::BadField(format!(
            "month/year {}-{} disagree with date {}",
            input.year, input.month, date
        )));
    }
    Ok(date)
}

fn slot_from_row(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        batch_number: row.get(3)?,
        day_number: row.get(4)?,
        topic_name: row.get(5)?,
        month: row.get(6)?,
        year: row.get(7)?,
    })
}

const SLOT_COLUMNS: &str =
    "id, user_id, date, batch_number, day_number, topic_name, month, year";

pub fn list_for_owner(conn: &Connection, owner: &str) -> Result<Vec<Slot>, SyncError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM slots WHERE user_id = ? ORDER BY date",
            SLOT_COLUMNS
        ))
        .map_err(store_err)?;
    stmt.query_map([owner], slot_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(store_err)
}

fn insert_slot(
    conn: &Connection,
    owner: &str,
    date: NaiveDate,
    input: &SlotInput,
) -> Result<String, SyncError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO slots(id, user_id, date, batch_number, day_number, topic_name, month, year, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            owner,
            date.format("%Y-%m-%d").to_string(),
            input.batch_number,
            input.day_number,
            input.topic_name.trim(),
            input.month,
            input.year,
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(store_err)?;
    Ok(id)
}

/// Replace the owner's entire persisted slot set with `inputs`.
///
/// Whole-batch validation runs first; nothing is written on any violation.
/// Delete and reinsert then run inside one transaction, so a mid-flight
/// failure rolls back to the pre-image instead of leaving the owner with
/// zero slots. Only a failed commit is reported as ambiguous
/// (`SyncIncomplete`). Returns the canonical persisted set, date ascending.
pub fn replace_all(
    conn: &Connection,
    owner: &str,
    inputs: &[SlotInput],
) -> Result<Vec<Slot>, SyncError> {
    let mut seen: HashSet<NaiveDate> = HashSet::new();
    let mut parsed: Vec<(NaiveDate, &SlotInput)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let date = validate_input(input)?;
        if !seen.insert(date) {
            return Err(SyncError::DuplicateInPayload(date.to_string()));
        }
        parsed.push((date, input));
    }

    let tx = conn.unchecked_transaction().map_err(store_err)?;
    tx.execute("DELETE FROM slots WHERE user_id = ?", [owner])
        .map_err(store_err)?;
    for (date, input) in &parsed {
        if let Err(e) = insert_slot(&tx, owner, *date, input) {
            let _ = tx.rollback();
            return Err(e);
        }
    }
    tx.commit()
        .map_err(|e| SyncError::SyncIncomplete(e.to_string()))?;

    list_for_owner(conn, owner)
}

/// Insert one slot; `(owner, date)` uniqueness is enforced by the store.
pub fn create_one(conn: &Connection, owner: &str, input: &SlotInput) -> Result<Slot, SyncError> {
    let date = validate_input(input)?;
    let id = insert_slot(conn, owner, date, input)?;
    conn.query_row(
        &format!("SELECT {} FROM slots WHERE id = ?", SLOT_COLUMNS),
        [&id],
        slot_from_row,
    )
    .map_err(store_err)
}

/// Delete one slot by id. Permitted only when the acting user owns it.
pub fn delete_one(conn: &Connection, acting_user: &str, slot_id: &str) -> Result<(), SyncError> {
    let owner: Option<String> = conn
        .query_row("SELECT user_id FROM slots WHERE id = ?", [slot_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(store_err)?;
    let Some(owner) = owner else {
        return Err(SyncError::NotFound);
    };
    if owner != acting_user {
        return Err(SyncError::Unauthorized);
    }
    conn.execute("DELETE FROM slots WHERE id = ?", [slot_id])
        .map_err(store_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn add_user(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO users(id, first_name, last_name, email, phone) VALUES(?, ?, ?, ?, ?)",
            (id, "Test", "User", format!("{}@example.com", id), "555-0100"),
        )
        .expect("insert user");
    }

    fn input(date: &str, batch: i64, day: i64) -> SlotInput {
        let parsed = parse_date(date).expect("test date");
        SlotInput {
            date: date.to_string(),
            batch_number: batch,
            day_number: day,
            topic_name: format!("Topic {}", day),
            month: i64::from(parsed.month()),
            year: i64::from(parsed.year()),
        }
    }

    #[test]
    fn replace_all_round_trips_ordered_by_date() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");

        let inputs = vec![
            input("2024-02-08", 1, 7),
            input("2024-02-01", 1, 1),
            input("2024-02-05", 1, 4),
        ];
        let slots = replace_all(&conn, "user1", &inputs).expect("replace");
        let dates: Vec<&str> = slots.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-02-01", "2024-02-05", "2024-02-08"]);

        let listed = list_for_owner(&conn, "user1").expect("list");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].date, "2024-02-01");
    }

    #[test]
    fn replace_all_is_idempotent() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");

        let inputs = vec![input("2024-02-01", 1, 1), input("2024-02-02", 1, 2)];
        let first = replace_all(&conn, "user1", &inputs).expect("first replace");
        let second = replace_all(&conn, "user1", &inputs).expect("second replace");

        let key = |slots: &[Slot]| -> Vec<(String, i64, i64)> {
            slots
                .iter()
                .map(|s| (s.date.clone(), s.batch_number, s.day_number))
                .collect()
        };
        assert_eq!(key(&first), key(&second));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn duplicate_date_in_payload_leaves_prior_state_untouched() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");
        replace_all(&conn, "user1", &[input("2024-02-01", 1, 1)]).expect("seed");

        let dup = vec![
            input("2024-02-05", 1, 4),
            input("2024-02-05", 1, 4),
        ];
        let err = replace_all(&conn, "user1", &dup).expect_err("must reject");
        assert_eq!(err.code(), "duplicate_in_payload");
        assert!(!err.may_be_inconsistent());

        let listed = list_for_owner(&conn, "user1").expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].date, "2024-02-01");
    }

    #[test]
    fn out_of_range_fields_reject_whole_batch() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");
        replace_all(&conn, "user1", &[input("2024-02-01", 1, 1)]).expect("seed");

        let mut bad = input("2024-02-05", 1, 4);
        bad.batch_number = 4;
        let err =
            replace_all(&conn, "user1", &[input("2024-02-02", 1, 2), bad]).expect_err("reject");
        assert_eq!(err.code(), "bad_params");

        let listed = list_for_owner(&conn, "user1").expect("list");
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn month_year_must_agree_with_date() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");

        let mut skewed = input("2024-02-05", 1, 1);
        skewed.month = 3;
        let err = replace_all(&conn, "user1", &[skewed]).expect_err("reject");
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn replace_with_empty_set_clears_everything() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");
        replace_all(
            &conn,
            "user1",
            &[input("2024-02-01", 1, 1), input("2024-02-02", 1, 2)],
        )
        .expect("seed");

        let replaced = replace_all(&conn, "user1", &[]).expect("clear");
        assert!(replaced.is_empty());
        assert!(list_for_owner(&conn, "user1").expect("list").is_empty());
    }

    #[test]
    fn replace_all_touches_only_the_given_owner() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");
        add_user(&conn, "user2");
        replace_all(&conn, "user2", &[input("2024-02-01", 1, 1)]).expect("seed user2");

        replace_all(&conn, "user1", &[input("2024-02-02", 1, 2)]).expect("replace user1");
        replace_all(&conn, "user1", &[]).expect("clear user1");

        let other = list_for_owner(&conn, "user2").expect("list user2");
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn create_one_reports_double_booking() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");

        create_one(&conn, "user1", &input("2024-02-01", 1, 1)).expect("first create");
        let err = create_one(&conn, "user1", &input("2024-02-01", 1, 1)).expect_err("conflict");
        assert_eq!(err.code(), "conflict_on_insert");
        assert!(err.may_be_inconsistent());

        // A different owner can book the same date.
        add_user(&conn, "user2");
        create_one(&conn, "user2", &input("2024-02-01", 1, 1)).expect("other owner");
    }

    #[test]
    fn delete_one_enforces_ownership() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");
        add_user(&conn, "user2");
        let slot = create_one(&conn, "user1", &input("2024-02-01", 1, 1)).expect("create");

        let err = delete_one(&conn, "user2", &slot.id).expect_err("wrong owner");
        assert_eq!(err.code(), "unauthorized");
        assert_eq!(list_for_owner(&conn, "user1").expect("list").len(), 1);

        delete_one(&conn, "user1", &slot.id).expect("owner delete");
        assert!(list_for_owner(&conn, "user1").expect("list").is_empty());

        let err = delete_one(&conn, "user1", &slot.id).expect_err("already gone");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn date_accepts_iso_datetime_suffix() {
        let conn = db::open_in_memory();
        add_user(&conn, "user1");

        let mut from_browser = input("2024-02-01", 1, 1);
        from_browser.date = "2024-02-01T00:00:00.000Z".to_string();
        let slot = create_one(&conn, "user1", &from_browser).expect("create");
        assert_eq!(slot.date, "2024-02-01");
    }
}
