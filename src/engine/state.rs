//! Shared scanner state read by the dashboard and written by the poll
//! cycles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::alert::{ActionMessage, Transient};
use super::merge::OpportunityBook;
use super::notify::Notification;
use crate::config::AccountConfig;
use crate::types::{EconomicEvent, EventAnalysis, HistoricalTrade, MarketAnalysis, SniperError};

/// Scheduler status as shown in the dashboard header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStatus {
    pub last_updated: Option<DateTime<Utc>>,
    /// First cycle in flight.
    pub loading: bool,
    /// A later cycle (or an autopilot run) in flight.
    pub polling: bool,
    pub initial_load_done: bool,
    pub cycles: u64,
    pub failed_cycles: u64,
    pub autopilot_active: bool,
    /// An autopilot run is in flight.
    pub autopilot_busy: bool,
}

pub struct ScanState {
    pub book: RwLock<OpportunityBook>,
    pub market_analysis: RwLock<Option<MarketAnalysis>>,
    /// `None` until the first cycle lands.
    pub events: RwLock<Option<Vec<EconomicEvent>>>,
    pub history: RwLock<Option<Vec<HistoricalTrade>>>,
    pub status: RwLock<ScanStatus>,
    pub notification: Mutex<Transient<Notification>>,
    pub action: Mutex<Transient<ActionMessage>>,
    /// Per-opportunity alert toggles. Session only.
    pub active_alerts: RwLock<HashSet<String>>,
    pub account: RwLock<AccountConfig>,
}

impl ScanState {
    pub fn new(
        cap: usize,
        notification_ttl: Duration,
        action_ttl: Duration,
        account: AccountConfig,
    ) -> Self {
        Self {
            book: RwLock::new(OpportunityBook::new(cap)),
            market_analysis: RwLock::new(None),
            events: RwLock::new(None),
            history: RwLock::new(None),
            status: RwLock::new(ScanStatus::default()),
            notification: Mutex::new(Transient::new(notification_ttl)),
            action: Mutex::new(Transient::new(action_ttl)),
            active_alerts: RwLock::new(HashSet::new()),
            account: RwLock::new(account),
        }
    }

    /// Current book. Cheap; shares storage with the live state.
    pub async fn book(&self) -> OpportunityBook {
        self.book.read().await.clone()
    }

    pub async fn status(&self) -> ScanStatus {
        self.status.read().await.clone()
    }

    pub async fn account(&self) -> AccountConfig {
        *self.account.read().await
    }

    pub async fn set_account(&self, balance: f64, risk_pct: f64) -> Result<AccountConfig, SniperError> {
        if !(balance > 0.0) {
            return Err(SniperError::InvalidInput("balance must be positive".into()));
        }
        if !(risk_pct > 0.0 && risk_pct <= 100.0) {
            return Err(SniperError::InvalidInput("risk_pct must be in (0, 100]".into()));
        }
        let mut account = self.account.write().await;
        *account = AccountConfig { balance, risk_pct };
        Ok(*account)
    }

    pub async fn push_action(&self, message: ActionMessage) {
        self.action.lock().await.set(message);
    }

    pub async fn current_action(&self) -> Option<ActionMessage> {
        self.action.lock().await.current()
    }

    pub async fn current_notification(&self) -> Option<Notification> {
        self.notification.lock().await.current()
    }

    pub async fn dismiss_notification(&self) {
        self.notification.lock().await.dismiss();
    }

    pub async fn has_alert(&self, opportunity_id: &str) -> bool {
        self.active_alerts.read().await.contains(opportunity_id)
    }

    /// Flip the session alert for a retained opportunity; returns the new
    /// state.
    pub async fn toggle_alert(&self, opportunity_id: &str) -> Result<bool, SniperError> {
        if !self.book.read().await.contains(opportunity_id) {
            return Err(SniperError::NotFound(format!("opportunity {opportunity_id}")));
        }
        let mut alerts = self.active_alerts.write().await;
        if alerts.remove(opportunity_id) {
            Ok(false)
        } else {
            alerts.insert(opportunity_id.to_string());
            Ok(true)
        }
    }

    /// Cache an analysis on a calendar event. Lost when the calendar is
    /// next refreshed.
    pub async fn attach_analysis(&self, event_id: &str, analysis: EventAnalysis) -> Result<EconomicEvent, SniperError> {
        let mut events = self.events.write().await;
        let event = events
            .as_mut()
            .and_then(|list| list.iter_mut().find(|e| e.id == event_id))
            .ok_or_else(|| SniperError::NotFound(format!("event {event_id}")))?;
        event.analysis = Some(analysis);
        Ok(event.clone())
    }

    pub async fn event(&self, event_id: &str) -> Option<EconomicEvent> {
        self.events
            .read()
            .await
            .as_ref()
            .and_then(|list| list.iter().find(|e| e.id == event_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
