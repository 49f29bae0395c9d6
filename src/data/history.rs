//! Trade journal: generated history, filters and summary statistics.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{pip_multiplier, Bias, HistoricalTrade, SniperError, SymbolKind, TradeResult, AVAILABLE_SYMBOLS};

/// Trades in a generated journal.
pub const HISTORY_SIZE: usize = 50;

/// Oldest close date, in days before now.
const HISTORY_DAYS: i64 = 90;

/// Fixed risk per journal trade, in account currency.
const RISK_PER_TRADE: f64 = 100.0;

const WIN_NOTE: &str = "Followed the plan perfectly. The entry was precise on the order block.";
const LOSS_NOTE: &str = "Hesitant entry, moved the SL too early. Need to trust my initial analysis more.";

fn base_price<R: Rng>(rng: &mut R, pair: &str) -> f64 {
    match SymbolKind::of(pair) {
        SymbolKind::Metal => 2300.0 + rng.gen::<f64>() * 100.0,
        SymbolKind::Index => 18_000.0 + rng.gen::<f64>() * 20_000.0,
        SymbolKind::Forex if pair.contains("JPY") => 140.0 + rng.gen::<f64>() * 20.0,
        SymbolKind::Forex => 1.05 + rng.gen::<f64>() * 0.2,
    }
}

/// Fifty closed trades from the last 90 days, newest first, ~60% winners.
pub fn generate_trades<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Vec<HistoricalTrade> {
    let mut trades: Vec<HistoricalTrade> = (0..HISTORY_SIZE)
        .filter_map(|i| {
            let pair = *AVAILABLE_SYMBOLS.choose(rng)?;
            let bias = if rng.gen_bool(0.5) { Bias::Bullish } else { Bias::Bearish };
            let entry_price = base_price(rng, pair);

            // 10–30 pips (or points) of risk, expressed in price units.
            let stop_distance = (10.0 + rng.gen::<f64>() * 20.0) / pip_multiplier(pair);
            let reward_ratio = 1.5 + rng.gen::<f64>() * 4.0;
            let is_win = rng.gen_bool(0.6);

            let sign = if bias.is_bullish() { 1.0 } else { -1.0 };
            let exit_price = if is_win {
                entry_price + sign * stop_distance * reward_ratio
            } else {
                entry_price - sign * stop_distance
            };

            let close_date = now
                - Duration::days(rng.gen_range(0..HISTORY_DAYS))
                - Duration::minutes(rng.gen_range(0..24 * 60));

            Some(HistoricalTrade {
                id: format!("hist-{i}-{}", Uuid::new_v4().simple()),
                pair: pair.to_string(),
                bias,
                entry_price,
                exit_price,
                close_date,
                result: if is_win { TradeResult::Win } else { TradeResult::Loss },
                profit_or_loss: if is_win { RISK_PER_TRADE * reward_ratio } else { -RISK_PER_TRADE },
                notes: Some(if is_win { WIN_NOTE } else { LOSS_NOTE }.to_string()),
                setup_quality: Some(rng.gen_range(3..=5)),
                execution_quality: Some(if is_win { rng.gen_range(4..=5) } else { rng.gen_range(2..=4) }),
                confluence_count: Some(rng.gen_range(3..=7)),
            })
        })
        .collect();

    trades.sort_by(|a, b| b.close_date.cmp(&a.close_date));
    trades
}

// ---------------------------------------------------------------------------
// Filters and stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeFilter {
    pub pair: Option<String>,
    pub result: Option<TradeResult>,
}

impl TradeFilter {
    pub fn matches(&self, trade: &HistoricalTrade) -> bool {
        self.pair.as_deref().map_or(true, |p| trade.pair == p)
            && self.result.map_or(true, |r| trade.result == r)
    }
}

pub fn filter_trades<'a>(trades: &'a [HistoricalTrade], filter: &TradeFilter) -> Vec<&'a HistoricalTrade> {
    trades.iter().filter(|t| filter.matches(t)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JournalStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent, 0–100.
    pub win_rate: f64,
    pub total_pnl: f64,
}

pub fn journal_stats<'a, I>(trades: I) -> JournalStats
where
    I: IntoIterator<Item = &'a HistoricalTrade>,
{
    let mut stats = JournalStats::default();
    for trade in trades {
        stats.total_trades += 1;
        stats.total_pnl += trade.profit_or_loss;
        match trade.result {
            TradeResult::Win => stats.wins += 1,
            TradeResult::Loss => stats.losses += 1,
        }
    }
    if stats.total_trades > 0 {
        stats.win_rate = stats.wins as f64 / stats.total_trades as f64 * 100.0;
    }
    stats
}

/// Replace the notes of one journal trade.
pub fn set_trade_notes(trades: &mut [HistoricalTrade], id: &str, notes: &str) -> Result<(), SniperError> {
    let trade = trades
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| SniperError::NotFound(format!("trade {id}")))?;
    trade.notes = if notes.trim().is_empty() { None } else { Some(notes.to_string()) };
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
