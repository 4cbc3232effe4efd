
use serde_json::json;
use test_support::{create_user, request_ok, slot_input, spawn_sidecar, temp_dir};

fn slot_dates(result: &serde_json::Value) -> Vec<String> {
    result
        .get("slots")
        .and_then(|v| v.as_array())
        .map(|slots| {
            slots
                .iter()
                .filter_map(|s| s.get("date").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn replace_all_round_trips_and_is_idempotent() {
    let workspace = temp_dir("slotbook-roundtrip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let user_id = create_user(&mut stdin, &mut reader, "2", "roundtrip@example.com");

    // Batch 1 of February 2024, submitted out of order.
    let desired = json!([
        slot_input("2024-02-08", 1, 7),
        slot_input("2024-02-01", 1, 1),
        slot_input("2024-02-05", 1, 4),
    ]);
    let replaced = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "slots.replaceAll",
        json!({ "userId": user_id, "slots": desired }),
    );
    assert_eq!(
        slot_dates(&replaced),
        vec!["2024-02-01", "2024-02-05", "2024-02-08"]
    );

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "slots.list",
        json!({ "userId": user_id }),
    );
    assert_eq!(
        slot_dates(&listed),
        vec!["2024-02-01", "2024-02-05", "2024-02-08"]
    );

    // Same payload again yields the same canonical set.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "slots.replaceAll",
        json!({ "userId": user_id, "slots": desired }),
    );
    assert_eq!(slot_dates(&again), slot_dates(&replaced));
}

#[test]
fn replace_all_with_empty_set_clears_persisted_slots() {
    let workspace = temp_dir("slotbook-clear");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let user_id = create_user(&mut stdin, &mut reader, "2", "clear@example.com");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "slots.replaceAll",
        json!({
            "userId": user_id,
            "slots": [slot_input("2024-02-01", 1, 1), slot_input("2024-02-02", 1, 2)]
        }),
    );

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "slots.replaceAll",
        json!({ "userId": user_id, "slots": [] }),
    );
    assert!(slot_dates(&cleared).is_empty());

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "slots.list",
        json!({ "userId": user_id }),
    );
    assert!(slot_dates(&listed).is_empty());
}

#[test]
fn replace_all_survives_daemon_restart() {
    let workspace = temp_dir("slotbook-durability");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let user_id = create_user(&mut stdin, &mut reader, "2", "durable@example.com");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "slots.replaceAll",
        json!({ "userId": user_id, "slots": [slot_input("2024-02-01", 1, 1)] }),
    );
    drop(stdin);

    let (_child2, mut stdin2, mut reader2) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin2,
        &mut reader2,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let listed = request_ok(
        &mut stdin2,
        &mut reader2,
        "2",
        "slots.list",
        json!({ "userId": user_id }),
    );
    assert_eq!(slot_dates(&listed), vec!["2024-02-01"]);
}
