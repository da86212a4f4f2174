//! Tests for the file-backed settings store.

use clause_error::SettingsErrorKind;
use clause_settings::{LimitsProvider, Settings, SettingsStore, SettingsUpdate};
use serde_json::json;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SettingsStore {
    SettingsStore::new(dir.path().join("data/settings.json"))
}

fn edit_by_hand(store: &SettingsStore, contents: &str) {
    std::fs::write(store.path(), contents).unwrap();
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.current().unwrap(), Settings::default());
    let limits = store.current_limits().unwrap();
    assert_eq!(limits.max_concurrent, 5);
    assert_eq!(limits.max_queue, 5);
    assert_eq!(store.current_rate_limit().unwrap(), 10);
}

#[test]
fn test_update_persists_and_is_visible_immediately() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    // Prime the cache with defaults first.
    assert_eq!(store.current_limits().unwrap().max_concurrent, 5);

    let settings = store
        .update(&SettingsUpdate {
            max_concurrent_requests: Some(2),
            max_queue_size: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(settings.max_concurrent_requests, 2);

    let limits = store.current_limits().unwrap();
    assert_eq!(limits.max_concurrent, 2);
    assert_eq!(limits.max_queue, 1);

    // A second store over the same file sees the same document.
    let other = SettingsStore::new(store.path());
    assert_eq!(other.current().unwrap(), settings);
}

#[test]
fn test_update_preserves_unknown_keys() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(
        store.path(),
        r#"{ "max_queue_size": 4, "admin_note": "raised for quarter close" }"#,
    )
    .unwrap();

    store
        .update(&SettingsUpdate {
            rate_limit_per_minute: Some(20),
            ..Default::default()
        })
        .unwrap();

    let document = store.document().unwrap();
    assert_eq!(document["admin_note"], json!("raised for quarter close"));
    assert_eq!(document["max_queue_size"], json!(4));
    assert_eq!(document["rate_limit_per_minute"], json!(20));
    assert_eq!(document["max_concurrent_requests"], json!(5));
}

#[test]
fn test_invalid_update_is_rejected_and_file_untouched() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .update(&SettingsUpdate {
            max_concurrent_requests: Some(3),
            ..Default::default()
        })
        .unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let err = store
        .update(&SettingsUpdate {
            max_concurrent_requests: Some(0),
            ..Default::default()
        })
        .unwrap_err();

    assert!(matches!(err.kind(), SettingsErrorKind::Invalid { .. }));
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    assert_eq!(store.current_limits().unwrap().max_concurrent, 3);
}

#[test]
fn test_hand_edits_are_picked_up_without_restart() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.update(&SettingsUpdate::default()).unwrap();
    assert_eq!(store.current_limits().unwrap().max_concurrent, 5);

    edit_by_hand(&store, r#"{ "max_concurrent_requests": 9 }"#);

    assert_eq!(store.current_limits().unwrap().max_concurrent, 9);
}

#[test]
fn test_same_length_edit_with_unchanged_mtime_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .update(&SettingsUpdate {
            max_concurrent_requests: Some(3),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(store.current_limits().unwrap().max_concurrent, 3);
    let before = std::fs::metadata(store.path()).unwrap();

    let edited = std::fs::read_to_string(store.path())
        .unwrap()
        .replace("\"max_concurrent_requests\": 3", "\"max_concurrent_requests\": 4");
    edit_by_hand(&store, &edited);
    let file = std::fs::File::options()
        .write(true)
        .open(store.path())
        .unwrap();
    file.set_modified(before.modified().unwrap()).unwrap();
    assert_eq!(std::fs::metadata(store.path()).unwrap().len(), before.len());

    assert_eq!(store.current_limits().unwrap().max_concurrent, 4);
}

#[test]
fn test_corrupt_file_fails_safe() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.update(&SettingsUpdate::default()).unwrap();

    edit_by_hand(&store, "{ not json");

    let err = store.current_limits().unwrap_err();
    assert!(matches!(err.kind(), SettingsErrorKind::Parse(_)));
    assert!(store.current_rate_limit().is_err());
}

#[test]
fn test_zero_limit_in_file_fails_safe() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.update(&SettingsUpdate::default()).unwrap();

    edit_by_hand(&store, r#"{ "max_concurrent_requests": 0 }"#);

    assert!(matches!(
        store.current_limits().unwrap_err().kind(),
        SettingsErrorKind::Invalid { .. }
    ));
}

#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .update(&SettingsUpdate {
            max_queue_size: Some(0),
            ..Default::default()
        })
        .unwrap();

    let settings = store.reset().unwrap();

    assert_eq!(settings, Settings::default());
    assert_eq!(store.current().unwrap(), Settings::default());
}
