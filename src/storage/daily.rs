//! Daily trading preparation: checklist and free-text journal, both
//! scoped to a calendar date. State saved on an earlier date is discarded.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::prefs::read_or;
use super::KeyValueStore;
use crate::types::{ChecklistItem, SniperError};

pub const CHECKLIST_KEY: &str = "tradingPrepChecklist";
pub const JOURNAL_KEY: &str = "tradingPrepJournal";

const DEFAULT_ITEMS: &[(&str, &str)] = &[
    ("check-econ", "Checked the economic calendar for high-impact news."),
    ("check-bias", "Set my directional bias for the main pairs."),
    ("check-emotion", "I am aware of my emotional state (calm, anxious, etc.)."),
    ("check-plan", "My trading plan is clear and in view."),
    ("check-risk", "Reviewed and confirmed my risk management for the day."),
];

#[derive(Debug, Serialize, Deserialize)]
struct DatedChecklist {
    date: NaiveDate,
    items: Vec<ChecklistItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatedJournal {
    date: NaiveDate,
    text: String,
}

fn default_checklist() -> Vec<ChecklistItem> {
    DEFAULT_ITEMS
        .iter()
        .map(|(id, text)| ChecklistItem {
            id: id.to_string(),
            text: text.to_string(),
            completed: false,
        })
        .collect()
}

pub struct DailyPrep {
    store: Arc<dyn KeyValueStore>,
    date: NaiveDate,
    checklist: Vec<ChecklistItem>,
    journal: String,
}

impl DailyPrep {
    /// Load today's state. Anything stored under another date is ignored.
    pub fn load(store: Arc<dyn KeyValueStore>, today: NaiveDate) -> Self {
        let checklist = read_or::<Option<DatedChecklist>, _>(&*store, CHECKLIST_KEY, || None)
            .filter(|c| c.date == today)
            .map(|c| c.items)
            .unwrap_or_else(default_checklist);

        let journal = read_or::<Option<DatedJournal>, _>(&*store, JOURNAL_KEY, || None)
            .filter(|j| j.date == today)
            .map(|j| j.text)
            .unwrap_or_default();

        debug!(%today, completed = checklist.iter().filter(|i| i.completed).count(), "Daily prep loaded");

        Self {
            store,
            date: today,
            checklist,
            journal,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn checklist(&self) -> &[ChecklistItem] {
        &self.checklist
    }

    pub fn journal(&self) -> &str {
        &self.journal
    }

    /// Share of checklist items done, 0–100.
    pub fn completion_pct(&self) -> f64 {
        if self.checklist.is_empty() {
            return 0.0;
        }
        let done = self.checklist.iter().filter(|i| i.completed).count();
        done as f64 / self.checklist.len() as f64 * 100.0
    }

    /// Reset to defaults if the day has changed since the last access.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if today != self.date {
            info!(from = %self.date, to = %today, "New trading day, daily prep reset");
            self.date = today;
            self.checklist = default_checklist();
            self.journal.clear();
        }
    }

    /// Flip one checklist item. Returns its new state.
    ///
    /// The new state is persisted before it replaces the in-memory copy.
    pub fn toggle_item(&mut self, id: &str) -> Result<bool> {
        let mut items = self.checklist.clone();
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| SniperError::NotFound(format!("checklist item {id}")))?;
        item.completed = !item.completed;
        let completed = item.completed;

        let doc = DatedChecklist {
            date: self.date,
            items,
        };
        self.write(CHECKLIST_KEY, &doc)?;
        self.checklist = doc.items;
        Ok(completed)
    }

    pub fn set_journal(&mut self, text: &str) -> Result<()> {
        let doc = DatedJournal {
            date: self.date,
            text: text.to_string(),
        };
        self.write(JOURNAL_KEY, &doc)?;
        self.journal = doc.text;
        Ok(())
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).with_context(|| format!("Failed to serialise {key}"))?;
        self.store
            .set(key, &json)
            .map_err(|e| SniperError::Storage(format!("{key}: {e:#}")))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
