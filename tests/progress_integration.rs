//! Progress persistence integration tests.
//!
//! Exercises the store against the on-disk JSON backend to check that
//! learning stats and achievements survive a restart while session state
//! does not.

use sprout_client::api::{Role, SessionResponse};
use sprout_client::store::{JsonFileStorage, ProgressStorage, Store};
use std::fs;
use tempfile::TempDir;

fn file_store(dir: &TempDir) -> Store {
    Store::new(Box::new(JsonFileStorage::in_dir(dir.path())))
}

fn session() -> SessionResponse {
    SessionResponse {
        session_id: "6f1c2e".to_string(),
        student_id: "student_001".to_string(),
        subject: "数学".to_string(),
        student_age: 6,
        created_at: "2026-03-01T09:00:00".to_string(),
        is_valid: true,
    }
}

#[test]
fn test_progress_survives_restart() {
    let dir = TempDir::new().expect("Failed to create temp directory");

    {
        let mut store = file_store(&dir);
        store.set_session(&session());
        store.add_message(Role::User, "5+3等于几？");
        for answer in [true, true, true, false, true] {
            store.record_answer(answer);
        }
        store.increment_study_time(300);
        store.mark_achievement_shown("first-correct");
    }

    let store = file_store(&dir);
    let stats = store.stats();
    assert_eq!(stats.total_questions, 5);
    assert_eq!(stats.correct_answers, 4);
    assert_eq!(stats.longest_streak, 3);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.today_study_time, 300);

    assert!(store.has_achievement("first-correct"));
    assert!(store.has_achievement("streak-3"));
    assert!(store.has_achievement("accuracy-80"));
    let unshown: Vec<_> = store.unshown_achievements().iter().map(|a| a.id.clone()).collect();
    assert_eq!(unshown, ["streak-3", "accuracy-80"]);

    // Session state is never persisted
    assert!(store.session_id().is_none());
    assert!(store.messages().is_empty());
}

#[test]
fn test_blob_layout_on_disk() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut store = file_store(&dir);
    store.set_session(&session());
    store.record_answer(true);

    let path = dir.path().join("sprout-progress.json");
    let blob: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).expect("Blob not written")).unwrap();

    assert_eq!(blob["version"], 1);
    assert_eq!(blob["state"]["stats"]["totalQuestions"], 1);
    assert_eq!(blob["state"]["stats"]["accuracy"], 100.0);
    assert_eq!(blob["state"]["achievements"][0]["id"], "first-correct");
    assert_eq!(blob["state"]["achievements"][0]["shown"], false);
    assert!(blob["state"]["achievements"][0]["unlockedAt"].is_string());
    assert_eq!(blob["state"]["unlockedAchievements"][0], "first-correct");

    // Nothing session-scoped leaks into the blob
    assert!(blob["state"].get("sessionId").is_none());
    assert!(blob["state"].get("messages").is_none());
}

#[test]
fn test_corrupt_file_starts_fresh_and_is_overwritten() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let storage = JsonFileStorage::in_dir(dir.path());
    storage.save("garbage").unwrap();

    let mut store = file_store(&dir);
    assert_eq!(store.stats().total_questions, 0);

    store.record_answer(false);
    let reloaded = file_store(&dir);
    assert_eq!(reloaded.stats().incorrect_answers, 1);
}

#[test]
fn test_clear_session_keeps_persisted_progress() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut store = file_store(&dir);
    store.set_session(&session());
    store.record_answer(true);

    let path = dir.path().join("sprout-progress.json");
    let before = fs::read_to_string(&path).unwrap();

    store.clear_session();

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(store.stats().correct_answers, 1);
}

#[test]
fn test_reset_achievements_is_persisted() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    {
        let mut store = file_store(&dir);
        for _ in 0..3 {
            store.record_answer(true);
        }
        store.reset_achievements();
    }

    let store = file_store(&dir);
    assert!(store.achievements().is_empty());
    assert!(!store.has_achievement("streak-3"));
    assert_eq!(store.stats().current_streak, 3);
}
