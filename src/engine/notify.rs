//! Notification policy and the audible cue.
//!
//! Given the items a merge reported as new and the set of pairs the user
//! wants alerts for, decide whether to announce anything and with what
//! wording.

use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::{debug, warn};

use crate::types::Opportunity;

/// Generic announcement when no alerted pair is involved.
pub const GENERIC_MESSAGE: &str = "New scanner opportunities found!";

/// A decided announcement for one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    /// Alerted pairs among the new items, in first-seen order.
    pub watchlist_pairs: Vec<String>,
    /// Whether the audible cue should play.
    pub chime: bool,
}

impl Notification {
    pub fn is_watchlist_match(&self) -> bool {
        !self.watchlist_pairs.is_empty()
    }
}

/// Stateless notification decision.
#[derive(Debug, Clone, Copy)]
pub struct NotificationPolicy {
    pub sound: bool,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self { sound: true }
    }
}

impl NotificationPolicy {
    pub fn new(sound: bool) -> Self {
        Self { sound }
    }

    /// Decide the announcement for a merge cycle.
    ///
    /// The initial load establishes the baseline and never announces.
    pub fn evaluate(
        &self,
        new_items: &[Opportunity],
        alert_pairs: &BTreeSet<String>,
        initial_load: bool,
    ) -> Option<Notification> {
        if initial_load || new_items.is_empty() {
            return None;
        }

        let mut watchlist_pairs: Vec<String> = Vec::new();
        for opp in new_items {
            if alert_pairs.contains(&opp.pair) && !watchlist_pairs.contains(&opp.pair) {
                watchlist_pairs.push(opp.pair.clone());
            }
        }

        let message = if watchlist_pairs.is_empty() {
            GENERIC_MESSAGE.to_string()
        } else {
            format!("New opportunity for watchlist pair(s) {}!", watchlist_pairs.join(", "))
        };

        debug!(new = new_items.len(), matched = watchlist_pairs.len(), "Notification decided");

        Some(Notification {
            message,
            watchlist_pairs,
            chime: self.sound,
        })
    }
}

// ---------------------------------------------------------------------------
// Audible cue
// ---------------------------------------------------------------------------

/// One-shot audible cue, separate from the visual notification.
pub trait Chime: Send + Sync {
    fn play(&self);
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&self) {
        let mut err = std::io::stderr();
        if let Err(e) = err.write_all(b"\x07").and_then(|_| err.flush()) {
            warn!(error = %e, "Failed to ring terminal bell");
        }
    }
}

/// No-op cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Chime for Silent {
    fn play(&self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
