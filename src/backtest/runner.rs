//! Simulated strategy backtester.
//!
//! Replays one trade roughly every three days over a date range with a
//! confluence-weighted win probability and compounding risk. The win
//! model is a placeholder heuristic, not derived from market data.

use chrono::{Days, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::types::{is_known_symbol, Bias, HistoricalTrade, SniperError, TradeResult};

/// Win probability with zero confluences.
const BASE_WIN_RATE: f64 = 0.30;

/// Added win probability per confluence.
const WIN_RATE_PER_CONFLUENCE: f64 = 0.07;

/// Average spacing between simulated trades, in days.
const TRADE_SPACING_DAYS: u64 = 3;

/// Longest accepted date range, in days (ten years).
pub const MAX_RANGE_DAYS: i64 = 3653;

// ---------------------------------------------------------------------------
// Parameters and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestParams {
    pub pair: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_balance: f64,
    /// Percent of the running balance risked per trade.
    pub risk_pct: f64,
}

impl BacktestParams {
    pub fn validate(&self) -> Result<(), SniperError> {
        if self.end_date < self.start_date {
            return Err(SniperError::InvalidInput("end date is before start date".into()));
        }
        if (self.end_date - self.start_date).num_days() > MAX_RANGE_DAYS {
            return Err(SniperError::InvalidInput(format!(
                "date range is longer than {MAX_RANGE_DAYS} days"
            )));
        }
        if !(self.initial_balance > 0.0) {
            return Err(SniperError::InvalidInput("initial balance must be positive".into()));
        }
        if !(self.risk_pct > 0.0 && self.risk_pct <= 100.0) {
            return Err(SniperError::InvalidInput("risk percentage must be in (0, 100]".into()));
        }
        if !is_known_symbol(&self.pair) {
            return Err(SniperError::InvalidInput(format!("unknown pair: {}", self.pair)));
        }
        Ok(())
    }
}

/// Results for trades sharing one confluence count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfluencePerformance {
    pub count: u32,
    pub total_trades: usize,
    /// Percent, 0–100.
    pub win_rate: f64,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent, 0–100.
    pub win_rate: f64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_profit_loss: f64,
    /// Gross gains over gross losses. Zero when there were no losses.
    pub profit_factor: f64,
    pub peak_balance: f64,
    pub max_drawdown_pct: f64,
    pub trades: Vec<HistoricalTrade>,
    pub confluence_analysis: Vec<ConfluencePerformance>,
}

/// Win probability for a setup with `confluences` supporting findings.
pub fn win_probability(confluences: u32) -> f64 {
    (BASE_WIN_RATE + confluences as f64 * WIN_RATE_PER_CONFLUENCE).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

pub struct Backtester {
    rng: Mutex<StdRng>,
}

impl Backtester {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn run(&self, params: &BacktestParams) -> Result<BacktestResult, SniperError> {
        params.validate()?;

        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let days = (params.end_date - params.start_date).num_days().max(0) as u64;
        let jitter: i64 = rng.gen_range(-5..=5);
        let trade_count = ((days / TRADE_SPACING_DAYS) as i64 + jitter).max(0) as u64;

        let mut balance = params.initial_balance;
        let mut peak = balance;
        let mut max_dd = 0.0_f64;
        let mut trades = Vec::with_capacity(trade_count as usize);

        for i in 0..trade_count {
            let bias = if rng.gen_bool(0.5) { Bias::Bullish } else { Bias::Bearish };
            let confluences: u32 = rng.gen_range(3..=7);
            let won = rng.gen_bool(win_probability(confluences));
            let reward_ratio = 1.5 + rng.gen::<f64>() * 2.0;

            let risk_amount = balance * (params.risk_pct / 100.0);
            let pnl = if won { risk_amount * reward_ratio } else { -risk_amount };
            balance += pnl;
            if !balance.is_finite() {
                return Err(SniperError::InvalidInput(
                    "simulated balance overflowed; lower the risk or shorten the range".into(),
                ));
            }

            if balance > peak {
                peak = balance;
            }
            if peak > 0.0 {
                max_dd = max_dd.max(1.0 - balance / peak);
            }

            // Jitter can add trades past the nominal spacing; keep them in range.
            let offset = (i * TRADE_SPACING_DAYS + rng.gen_range(0..2)).min(days);
            let close_day = params
                .start_date
                .checked_add_days(Days::new(offset))
                .unwrap_or(params.end_date);
            let close_date = Utc.from_utc_datetime(&close_day.and_time(chrono::NaiveTime::MIN));

            let entry_price = 1.1 + rng.gen::<f64>() * 0.1;
            let exit_price = 1.1 + rng.gen::<f64>() * 0.1;

            trades.push(HistoricalTrade {
                id: format!("backtest-{i}-{}", Uuid::new_v4().simple()),
                pair: params.pair.clone(),
                bias,
                entry_price,
                exit_price,
                close_date,
                result: if won { TradeResult::Win } else { TradeResult::Loss },
                profit_or_loss: pnl,
                notes: None,
                setup_quality: None,
                execution_quality: None,
                confluence_count: Some(confluences),
            });
        }

        let result = summarize(params.initial_balance, trades, peak, max_dd);

        info!(
            pair = %params.pair,
            trades = result.total_trades,
            win_rate = format!("{:.1}%", result.win_rate),
            final_balance = format!("${:.2}", result.final_balance),
            "Backtest complete"
        );

        Ok(result)
    }
}

impl Default for Backtester {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(initial_balance: f64, trades: Vec<HistoricalTrade>, peak: f64, max_dd: f64) -> BacktestResult {
    let total_trades = trades.len();
    let winning_trades = trades.iter().filter(|t| t.result == TradeResult::Win).count();
    let losing_trades = total_trades - winning_trades;
    let total_profit_loss: f64 = trades.iter().map(|t| t.profit_or_loss).sum();

    let gains: f64 = trades.iter().filter(|t| t.profit_or_loss > 0.0).map(|t| t.profit_or_loss).sum();
    let losses: f64 = trades.iter().filter(|t| t.profit_or_loss < 0.0).map(|t| -t.profit_or_loss).sum();

    let mut groups: BTreeMap<u32, Vec<&HistoricalTrade>> = BTreeMap::new();
    for trade in &trades {
        groups.entry(trade.confluence_count.unwrap_or(0)).or_default().push(trade);
    }
    let confluence_analysis = groups
        .into_iter()
        .map(|(count, group)| {
            let wins = group.iter().filter(|t| t.result == TradeResult::Win).count();
            ConfluencePerformance {
                count,
                total_trades: group.len(),
                win_rate: wins as f64 / group.len() as f64 * 100.0,
                total_pnl: group.iter().map(|t| t.profit_or_loss).sum(),
            }
        })
        .collect();

    BacktestResult {
        total_trades,
        winning_trades,
        losing_trades,
        win_rate: if total_trades > 0 { winning_trades as f64 / total_trades as f64 * 100.0 } else { 0.0 },
        initial_balance,
        final_balance: initial_balance + total_profit_loss,
        total_profit_loss,
        profit_factor: if losses > 0.0 { gains / losses } else { 0.0 },
        peak_balance: peak,
        max_drawdown_pct: max_dd * 100.0,
        trades,
        confluence_analysis,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
