//! Persistence of user preferences and the date-scoped daily prep across
//! reloads of the JSON file store.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use sniper::storage::daily::DailyPrep;
use sniper::storage::prefs::Preferences;
use sniper::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use sniper::types::DEFAULT_WATCHLIST;

fn scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("sniper-prefs-{}.json", uuid::Uuid::new_v4()))
}

fn open(path: &PathBuf) -> Arc<dyn KeyValueStore> {
    Arc::new(JsonFileStore::open(path).unwrap())
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

#[test]
fn preferences_survive_reload() {
    let path = scratch_path();

    {
        let mut prefs = Preferences::load(open(&path));
        assert_eq!(prefs.watchlist().len(), DEFAULT_WATCHLIST.len());
        assert!(prefs.add_to_watchlist("AUD/USD").unwrap());
        assert!(prefs.toggle_watchlist_alert("AUD/USD").unwrap());
        assert!(prefs.toggle_favorite("opp-7").unwrap());
    }

    let prefs = Preferences::load(open(&path));
    assert_eq!(prefs.watchlist().last().map(String::as_str), Some("AUD/USD"));
    assert!(prefs.watchlist_alerts().contains("AUD/USD"));
    assert!(prefs.is_favorite("opp-7"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn removing_a_pair_drops_its_alert() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut prefs = Preferences::load(store.clone());

    assert!(prefs.toggle_watchlist_alert("GBP/USD").unwrap());
    assert!(prefs.remove_from_watchlist("GBP/USD").unwrap());
    assert!(!prefs.watchlist_alerts().contains("GBP/USD"));

    // Re-adding starts without an alert.
    assert!(prefs.add_to_watchlist("GBP/USD").unwrap());
    assert!(!prefs.watchlist_alerts().contains("GBP/USD"));

    let reloaded = Preferences::load(store);
    assert!(reloaded.is_watched("GBP/USD"));
    assert!(reloaded.watchlist_alerts().is_empty());
}

#[test]
fn alert_on_unwatched_pair_is_rejected() {
    let mut prefs = Preferences::load(Arc::new(MemoryStore::new()));
    assert_err!(prefs.toggle_watchlist_alert("NZD/USD"));
    assert!(prefs.watchlist_alerts().is_empty());
}

#[test]
fn daily_prep_resets_on_a_new_day() {
    let path = scratch_path();

    {
        let mut prep = DailyPrep::load(open(&path), day(4));
        assert!(prep.toggle_item("check-econ").unwrap());
        assert!(prep.toggle_item("check-risk").unwrap());
        prep.set_journal("Waiting for NY open.").unwrap();
        assert!((prep.completion_pct() - 40.0).abs() < 1e-9);
    }

    let same_day = DailyPrep::load(open(&path), day(4));
    assert_eq!(same_day.checklist().iter().filter(|i| i.completed).count(), 2);
    assert_eq!(same_day.journal(), "Waiting for NY open.");

    let next_day = DailyPrep::load(open(&path), day(5));
    assert!(next_day.checklist().iter().all(|i| !i.completed));
    assert_eq!(next_day.checklist().len(), 5);
    assert!(next_day.journal().is_empty());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn roll_over_discards_yesterday_in_memory() {
    let mut prep = DailyPrep::load(Arc::new(MemoryStore::new()), day(4));
    assert_ok!(prep.toggle_item("check-plan"));
    assert_ok!(prep.set_journal("notes"));

    prep.roll_over(day(4));
    assert!((prep.completion_pct() - 20.0).abs() < 1e-9);

    prep.roll_over(day(5));
    assert_eq!(prep.date(), day(5));
    assert_eq!(prep.completion_pct(), 0.0);
    assert!(prep.journal().is_empty());
}
