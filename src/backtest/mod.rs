//! Backtesting of the sniper entry model.

pub mod runner;

pub use runner::{BacktestParams, BacktestResult, Backtester, ConfluencePerformance};
