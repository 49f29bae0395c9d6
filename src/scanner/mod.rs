//! Opportunity generation.
//!
//! Defines the `OpportunityGenerator` capability consumed by the poll
//! scheduler and the autopilot. The bundled implementation fabricates
//! "sniper entry model" setups; a real data feed or model can replace it
//! without touching the scheduler.

pub mod sniper;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Opportunity;

/// Abstraction over opportunity sources.
///
/// Implementors are nondeterministic and hold no state the caller can
/// observe beyond the returned batch. Every returned opportunity carries
/// an id that is never reused.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OpportunityGenerator: Send + Sync {
    /// Produce at most `max_count` fresh opportunities (possibly none).
    async fn generate(&self, max_count: usize) -> Result<Vec<Opportunity>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
