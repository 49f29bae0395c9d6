//! User preference state store.
//!
//! Favorites, watchlist and watchlist alerts are read once from the
//! injected store at construction and written back on every change.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::KeyValueStore;
use crate::types::{SniperError, DEFAULT_WATCHLIST};

pub const FAVORITES_KEY: &str = "favorites";
pub const WATCHLIST_KEY: &str = "watchlist";
pub const WATCHLIST_ALERTS_KEY: &str = "watchlistAlerts";

pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
    favorites: BTreeSet<String>,
    /// Insertion order is display order.
    watchlist: Vec<String>,
    watchlist_alerts: BTreeSet<String>,
}

impl Preferences {
    /// Read the preferences, falling back to defaults for anything missing
    /// or unreadable.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let favorites: BTreeSet<String> = read_or(&*store, FAVORITES_KEY, BTreeSet::new);
        let watchlist: Vec<String> = read_or(&*store, WATCHLIST_KEY, || {
            DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect()
        });
        let mut watchlist_alerts: BTreeSet<String> = read_or(&*store, WATCHLIST_ALERTS_KEY, BTreeSet::new);

        // An alert without its watchlist entry is unreachable.
        watchlist_alerts.retain(|p| watchlist.contains(p));

        info!(
            favorites = favorites.len(),
            watchlist = watchlist.len(),
            alerts = watchlist_alerts.len(),
            "Preferences loaded"
        );

        Self {
            store,
            favorites,
            watchlist,
            watchlist_alerts,
        }
    }

    pub fn favorites(&self) -> &BTreeSet<String> {
        &self.favorites
    }

    pub fn is_favorite(&self, opportunity_id: &str) -> bool {
        self.favorites.contains(opportunity_id)
    }

    pub fn watchlist(&self) -> &[String] {
        &self.watchlist
    }

    pub fn is_watched(&self, pair: &str) -> bool {
        self.watchlist.iter().any(|p| p == pair)
    }

    pub fn watchlist_alerts(&self) -> &BTreeSet<String> {
        &self.watchlist_alerts
    }

    /// Flip the favorite flag. Returns the new state.
    ///
    /// Every mutator persists a candidate first and only then replaces the
    /// in-memory value, so a failed write leaves both sides unchanged.
    pub fn toggle_favorite(&mut self, opportunity_id: &str) -> Result<bool> {
        let mut favorites = self.favorites.clone();
        let now_favorite = if favorites.remove(opportunity_id) {
            false
        } else {
            favorites.insert(opportunity_id.to_string());
            true
        };
        self.write(FAVORITES_KEY, &favorites)?;
        self.favorites = favorites;
        Ok(now_favorite)
    }

    /// Add a pair to the watchlist. Returns false if it was already there.
    pub fn add_to_watchlist(&mut self, pair: &str) -> Result<bool> {
        let pair = pair.trim();
        if pair.is_empty() {
            return Err(SniperError::InvalidInput("pair must not be empty".into()).into());
        }
        if self.is_watched(pair) {
            return Ok(false);
        }
        let mut watchlist = self.watchlist.clone();
        watchlist.push(pair.to_string());
        self.write(WATCHLIST_KEY, &watchlist)?;
        self.watchlist = watchlist;
        Ok(true)
    }

    /// Remove a pair from the watchlist and drop its alert.
    /// Returns false if the pair was not watched.
    pub fn remove_from_watchlist(&mut self, pair: &str) -> Result<bool> {
        let pair = pair.trim();
        if !self.is_watched(pair) {
            return Ok(false);
        }

        // Alert goes first: if the watchlist write then fails, the pair is
        // still watched with no alert, which is a valid state on both sides.
        if self.watchlist_alerts.contains(pair) {
            let mut alerts = self.watchlist_alerts.clone();
            alerts.remove(pair);
            self.write(WATCHLIST_ALERTS_KEY, &alerts)?;
            self.watchlist_alerts = alerts;
        }

        let watchlist: Vec<String> = self.watchlist.iter().filter(|p| p.as_str() != pair).cloned().collect();
        self.write(WATCHLIST_KEY, &watchlist)?;
        self.watchlist = watchlist;
        Ok(true)
    }

    /// Flip the alert flag for a watched pair. Returns the new state.
    pub fn toggle_watchlist_alert(&mut self, pair: &str) -> Result<bool> {
        let pair = pair.trim();
        if !self.is_watched(pair) {
            return Err(SniperError::NotFound(format!("{pair} is not on the watchlist")).into());
        }
        let mut alerts = self.watchlist_alerts.clone();
        let now_alerted = if alerts.remove(pair) {
            false
        } else {
            alerts.insert(pair.to_string());
            true
        };
        self.write(WATCHLIST_ALERTS_KEY, &alerts)?;
        self.watchlist_alerts = alerts;
        Ok(now_alerted)
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).with_context(|| format!("Failed to serialise {key}"))?;
        self.store
            .set(key, &json)
            .map_err(|e| SniperError::Storage(format!("{key}: {e:#}")))?;
        Ok(())
    }
}

/// Read and decode `key`, using `default` when absent or malformed.
pub(crate) fn read_or<T, F>(store: &dyn KeyValueStore, key: &str, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Stored preference is malformed, using default");
                default()
            }
        },
        Ok(None) => default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored preference, using default");
            default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
