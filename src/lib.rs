//! SNIPER: Smart Money Concepts signal scanner
//!
//! Generated setups are merged into a capped book, announced when new,
//! and forwarded to Telegram by hand or by the autopilot. The binary
//! wires these modules together; the integration tests drive them
//! directly.

pub mod config;
pub mod types;
pub mod scanner;
pub mod data;
pub mod strategy;
pub mod backtest;
pub mod engine;
pub mod sink;
pub mod analyst;
pub mod storage;
pub mod dashboard;
