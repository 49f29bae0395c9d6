//! LLM explanation of scheduled economic releases.
//!
//! Defines the `EventAnalyst` trait and the Anthropic Messages API
//! implementation. The dashboard asks for an analysis on demand and caches
//! it on the event.

pub mod anthropic;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{EconomicEvent, EventAnalysis};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventAnalyst: Send + Sync {
    /// Explain what the release measures and how a beat or miss would
    /// move the currency.
    async fn analyze(&self, event: &EconomicEvent) -> Result<EventAnalysis>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}
