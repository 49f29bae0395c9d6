//! Outbound delivery of opportunities to a messaging service.

pub mod telegram;

use async_trait::async_trait;

use crate::types::Opportunity;

/// Delivers one formatted opportunity to a third party.
///
/// At most one attempt per call; no retry, no queue. Every failure
/// (missing credentials, transport, non-2xx, provider rejection) comes
/// back as `false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingSink: Send + Sync {
    async fn deliver(&self, opportunity: &Opportunity, balance: f64, risk_pct: f64) -> bool;

    /// Sink name for logging.
    fn name(&self) -> &str;
}
