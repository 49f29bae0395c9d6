//! Auxiliary side data shown alongside the scanner feed.
//!
//! Market analysis, economic calendar, trade journal history and the
//! correlation matrix all come through one `SideDataSource` capability.
//! The bundled `SimulatedSideData` fabricates them; nothing is fetched
//! from a real feed.

pub mod analysis;
pub mod calendar;
pub mod correlation;
pub mod history;
pub mod sessions;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::types::{EconomicEvent, HistoricalTrade, MarketAnalysis, AVAILABLE_SYMBOLS};
use correlation::CorrelationMatrix;

/// Abstraction over the secondary data refreshed by each poll cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SideDataSource: Send + Sync {
    /// Per-pair higher-timeframe bias for every known symbol.
    async fn market_analysis(&self) -> Result<MarketAnalysis>;

    /// Upcoming events, sorted by date ascending.
    async fn economic_events(&self) -> Result<Vec<EconomicEvent>>;

    /// Closed trades for the journal, newest first.
    async fn historical_trades(&self) -> Result<Vec<HistoricalTrade>>;

    /// Pairwise correlation for `pairs`.
    async fn correlation_matrix(&self, pairs: &[String]) -> Result<CorrelationMatrix>;
}

/// Randomized side data.
pub struct SimulatedSideData {
    rng: Mutex<StdRng>,
    latency: Duration,
}

const DEFAULT_LATENCY: Duration = Duration::from_millis(400);

impl SimulatedSideData {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            latency: DEFAULT_LATENCY,
        }
    }

    /// Deterministic source with no simulated latency.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for SimulatedSideData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SideDataSource for SimulatedSideData {
    async fn market_analysis(&self) -> Result<MarketAnalysis> {
        self.simulate_latency().await;
        let analysis = analysis::generate_market_analysis(&mut *self.rng(), AVAILABLE_SYMBOLS);
        debug!(pairs = analysis.len(), "Market analysis generated");
        Ok(analysis)
    }

    async fn economic_events(&self) -> Result<Vec<EconomicEvent>> {
        self.simulate_latency().await;
        let events = calendar::generate_events(&mut *self.rng(), Utc::now());
        debug!(events = events.len(), "Economic calendar generated");
        Ok(events)
    }

    async fn historical_trades(&self) -> Result<Vec<HistoricalTrade>> {
        self.simulate_latency().await;
        let trades = history::generate_trades(&mut *self.rng(), Utc::now());
        debug!(trades = trades.len(), "Trade history generated");
        Ok(trades)
    }

    async fn correlation_matrix(&self, pairs: &[String]) -> Result<CorrelationMatrix> {
        self.simulate_latency().await;
        Ok(correlation::generate_matrix(&mut *self.rng(), pairs))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
