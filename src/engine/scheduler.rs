//! Poll scheduler and autopilot.
//!
//! Two independent periodic jobs share one `ScanContext`:
//!
//! - the main poll runs immediately and then every `poll_interval`:
//!   generate, merge, notify, refresh side data, stamp the time;
//! - the autopilot, while enabled, asks the generator for a single
//!   opportunity every `autopilot_interval` and forwards it to the
//!   messaging sink.
//!
//! A failed cycle is logged and the schedule carries on. Stopping either
//! job cancels its timer at once and nothing it had in flight touches
//! state afterwards.

use anyhow::Result;
use chrono::Utc;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::alert::ActionMessage;
use super::notify::{Chime, NotificationPolicy};
use super::state::ScanState;
use super::task::{FirstTick, PeriodicTask, TaskGuard};
use crate::config::AppConfig;
use crate::data::SideDataSource;
use crate::scanner::OpportunityGenerator;
use crate::sink::MessagingSink;
use crate::storage::prefs::Preferences;
use crate::types::{Opportunity, SniperError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(45);
pub const DEFAULT_AUTOPILOT_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_PER_SCAN: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    pub poll_interval: Duration,
    pub autopilot_interval: Duration,
    pub max_per_scan: usize,
}

impl ScanSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            poll_interval: cfg.scanner.poll_interval(),
            autopilot_interval: cfg.autopilot.interval(),
            max_per_scan: cfg.scanner.max_per_scan,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            autopilot_interval: DEFAULT_AUTOPILOT_INTERVAL,
            max_per_scan: DEFAULT_MAX_PER_SCAN,
        }
    }
}

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub initial: bool,
    pub generated: usize,
    pub rejected: usize,
    pub new_items: usize,
    pub retained: usize,
    pub notified: bool,
}

/// Everything a cycle needs: the collaborators and the shared state.
#[derive(Clone)]
pub struct ScanContext {
    pub generator: Arc<dyn OpportunityGenerator>,
    pub side_data: Arc<dyn SideDataSource>,
    pub sink: Arc<dyn MessagingSink>,
    pub chime: Arc<dyn Chime>,
    pub state: Arc<ScanState>,
    pub prefs: Arc<RwLock<Preferences>>,
    pub policy: NotificationPolicy,
    pub settings: ScanSettings,
}

impl ScanContext {
    /// One main-poll cycle. Errors leave the book untouched.
    pub async fn poll_once(&self, guard: &TaskGuard) -> Result<CycleReport> {
        let initial = !self.state.status.read().await.initial_load_done;

        let (batch, analysis, events, history) = tokio::try_join!(
            self.generator.generate(self.settings.max_per_scan),
            self.side_data.market_analysis(),
            self.side_data.economic_events(),
            async {
                if initial {
                    self.side_data.historical_trades().await.map(Some)
                } else {
                    Ok(None)
                }
            },
        )?;

        if !guard.is_active() {
            anyhow::bail!("poll cycle cancelled");
        }

        let generated = batch.len();
        let batch = accept_valid(batch);
        let rejected = generated - batch.len();
        let alert_pairs = self.prefs.read().await.watchlist_alerts().clone();

        // Everything below commits under the book lock. Shutdown takes the
        // same lock after cancelling, so a cycle either lands before it
        // returns or sees the cancelled guard here.
        let mut book = self.state.book.write().await;
        if !guard.is_active() {
            anyhow::bail!("poll cycle cancelled");
        }

        let outcome = book.merge(batch);
        if !outcome.book.same_as(&book) {
            *book = outcome.book.clone();
        }

        let notification = self.policy.evaluate(&outcome.new_items, &alert_pairs, initial);
        let notified = notification.is_some();
        if let Some(notification) = notification {
            if notification.chime {
                self.chime.play();
            }
            info!(
                message = %notification.message,
                watchlist = notification.is_watchlist_match(),
                "Notification raised"
            );
            self.state.notification.lock().await.set(notification);
        }

        *self.state.market_analysis.write().await = Some(analysis);
        *self.state.events.write().await = Some(events);
        if let Some(history) = history {
            *self.state.history.write().await = Some(history);
        }
        self.state.status.write().await.last_updated = Some(Utc::now());
        drop(book);

        Ok(CycleReport {
            initial,
            generated,
            rejected,
            new_items: outcome.new_items.len(),
            retained: outcome.book.len(),
            notified,
        })
    }

    /// Run a poll cycle with status bookkeeping. Failures are logged and
    /// swallowed so the schedule keeps going.
    pub async fn run_poll_cycle(&self, guard: &TaskGuard) -> Option<CycleReport> {
        {
            let mut status = self.state.status.write().await;
            if status.initial_load_done {
                status.polling = true;
            } else {
                status.loading = true;
            }
        }

        let result = self.poll_once(guard).await;

        let mut status = self.state.status.write().await;
        if !guard.is_active() {
            debug!("Poll cycle finished after teardown, discarding");
            return None;
        }
        status.cycles += 1;
        status.loading = false;
        status.polling = false;
        status.initial_load_done = true;

        match result {
            Ok(report) => {
                info!(
                    cycle = status.cycles,
                    initial = report.initial,
                    generated = report.generated,
                    rejected = report.rejected,
                    new = report.new_items,
                    retained = report.retained,
                    notified = report.notified,
                    "Poll cycle complete"
                );
                Some(report)
            }
            Err(e) => {
                status.failed_cycles += 1;
                error!(cycle = status.cycles, error = %e, "Poll cycle failed, continuing");
                None
            }
        }
    }

    /// One autopilot run. Returns the delivery outcome, or `None` when
    /// the generator produced nothing or the run was cancelled first.
    pub async fn autopilot_once(&self, guard: &TaskGuard) -> Result<Option<bool>> {
        let batch = self.generator.generate(1).await?;
        let Some(opportunity) = accept_valid(batch).into_iter().next() else {
            debug!("Autopilot scan found nothing");
            return Ok(None);
        };

        {
            let mut book = self.state.book.write().await;
            if !guard.is_active() {
                return Ok(None);
            }
            let outcome = book.merge(vec![opportunity.clone()]);
            *book = outcome.book;
        }

        let account = self.state.account().await;
        let delivered = self
            .sink
            .deliver(&opportunity, account.balance, account.risk_pct)
            .await;

        if !guard.is_active() {
            return Ok(Some(delivered));
        }

        let message = if delivered {
            info!(pair = %opportunity.pair, id = %opportunity.id, "Autopilot signal sent");
            ActionMessage::success(format!("Autopilot sent a signal for {}.", opportunity.pair))
        } else {
            warn!(pair = %opportunity.pair, id = %opportunity.id, "Autopilot delivery failed");
            ActionMessage::error(format!(
                "Autopilot failed to send a signal for {}. Check the bot token configuration.",
                opportunity.pair
            ))
        };
        self.state.push_action(message).await;

        Ok(Some(delivered))
    }

    pub async fn run_autopilot_cycle(&self, guard: &TaskGuard) {
        self.state.status.write().await.autopilot_busy = true;

        let result = self.autopilot_once(guard).await;

        if !guard.is_active() {
            return;
        }
        if let Err(e) = result {
            error!(error = %e, "Autopilot scan failed");
            self.state
                .push_action(ActionMessage::error("An error occurred during the autopilot scan."))
                .await;
        }
        let mut status = self.state.status.write().await;
        if guard.is_active() {
            status.autopilot_busy = false;
        }
    }

    /// Deliver a retained opportunity on demand.
    pub async fn send_manual(&self, opportunity_id: &str) -> Result<bool, SniperError> {
        let opportunity = self
            .state
            .book()
            .await
            .get(opportunity_id)
            .cloned()
            .ok_or_else(|| SniperError::NotFound(format!("opportunity {opportunity_id}")))?;

        let account = self.state.account().await;
        let delivered = self
            .sink
            .deliver(&opportunity, account.balance, account.risk_pct)
            .await;

        let message = if delivered {
            info!(pair = %opportunity.pair, id = %opportunity.id, "Signal sent on demand");
            ActionMessage::success(format!("Signal for {} sent to Telegram.", opportunity.pair))
        } else {
            warn!(pair = %opportunity.pair, id = %opportunity.id, "Manual delivery failed");
            ActionMessage::error(format!(
                "Failed to send signal for {}. Check the bot token configuration.",
                opportunity.pair
            ))
        };
        self.state.push_action(message).await;

        Ok(delivered)
    }
}

/// Drop opportunities that break the price-ordering or analysis rules.
fn accept_valid(batch: Vec<Opportunity>) -> Vec<Opportunity> {
    batch
        .into_iter()
        .filter(|opp| match opp.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Discarding generated opportunity");
                false
            }
        })
        .collect()
}

fn describe_interval(period: Duration) -> String {
    let secs = period.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{secs} seconds")
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns the two periodic jobs.
pub struct Scheduler {
    ctx: Arc<ScanContext>,
    poll: Option<PeriodicTask>,
    autopilot: Option<PeriodicTask>,
}

impl Scheduler {
    pub fn new(ctx: Arc<ScanContext>) -> Self {
        Self {
            ctx,
            poll: None,
            autopilot: None,
        }
    }

    pub fn context(&self) -> &Arc<ScanContext> {
        &self.ctx
    }

    /// Start the main poll (first cycle right away) and, if requested,
    /// the autopilot.
    pub async fn start(&mut self, autopilot_enabled: bool) {
        if self.poll.is_none() {
            let ctx = self.ctx.clone();
            self.poll = Some(PeriodicTask::start(
                "poll",
                self.ctx.settings.poll_interval,
                FirstTick::Immediate,
                move |guard| {
                    let ctx = ctx.clone();
                    async move {
                        ctx.run_poll_cycle(&guard).await;
                    }
                    .boxed()
                },
            ));
        }
        if autopilot_enabled {
            self.set_autopilot(true).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.poll.as_ref().is_some_and(|t| t.is_running())
    }

    pub fn autopilot_active(&self) -> bool {
        self.autopilot.is_some()
    }

    /// Turn the autopilot on or off. Enabling schedules the first run one
    /// full period from now; disabling cancels any pending run at once.
    /// Returns whether anything changed.
    pub async fn set_autopilot(&mut self, enabled: bool) -> bool {
        if enabled == self.autopilot_active() {
            return false;
        }

        if enabled {
            let period = self.ctx.settings.autopilot_interval;
            let ctx = self.ctx.clone();
            self.autopilot = Some(PeriodicTask::start(
                "autopilot",
                period,
                FirstTick::AfterPeriod,
                move |guard| {
                    let ctx = ctx.clone();
                    async move {
                        ctx.run_autopilot_cycle(&guard).await;
                    }
                    .boxed()
                },
            ));
            self.ctx.state.status.write().await.autopilot_active = true;
            self.ctx
                .state
                .push_action(ActionMessage::info(format!(
                    "Autopilot enabled. Checking every {}.",
                    describe_interval(period)
                )))
                .await;
            info!(interval_secs = period.as_secs(), "Autopilot enabled");
        } else {
            if let Some(mut task) = self.autopilot.take() {
                task.stop();
            }
            {
                let mut status = self.ctx.state.status.write().await;
                status.autopilot_active = false;
                status.autopilot_busy = false;
            }
            self.ctx
                .state
                .push_action(ActionMessage::info("Autopilot disabled."))
                .await;
            info!("Autopilot disabled");
        }
        true
    }

    /// Cancel both jobs.
    pub async fn shutdown(&mut self) {
        if let Some(mut task) = self.autopilot.take() {
            task.stop();
        }
        if let Some(mut task) = self.poll.take() {
            task.stop();
        }
        // Wait out any cycle that is mid-commit.
        drop(self.ctx.state.book.write().await);
        let mut status = self.ctx.state.status.write().await;
        status.autopilot_active = false;
        status.autopilot_busy = false;
        status.loading = false;
        status.polling = false;
        info!(cycles = status.cycles, failed = status.failed_cycles, "Scheduler stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
