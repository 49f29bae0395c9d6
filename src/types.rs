//! Shared types for the SNIPER scanner.
//!
//! These types form the data model used across all modules: generated
//! opportunities, instrument tables, calendar events, journal trades and
//! the crate-level error enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

/// Every instrument the scanner knows about.
pub const AVAILABLE_SYMBOLS: &[&str] = &[
    "EUR/USD", "GBP/USD", "USD/JPY", "AUD/USD", "USD/CAD", "USD/CHF", "NZD/USD",
    "XAU/USD", "US30/USD", "US100/USD",
];

/// Pairs placed on the watchlist on first run.
pub const DEFAULT_WATCHLIST: &[&str] = &["EUR/USD", "GBP/USD", "USD/JPY", "XAU/USD", "US30/USD"];

/// Smart Money Concepts vocabulary used by findings and filters.
pub const SMC_CONCEPTS: &[&str] = &[
    "Higher Timeframe POI",
    "Break of Structure (BoS)",
    "Market Structure Shift (MSS)",
    "Change of Character (ChoCH)",
    "Order Block (OB)",
    "Fair Value Gap (FVG)",
    "Liquidity Grab",
    "Inducement (IDM)",
    "Optimal Trade Entry (OTE)",
    "Displacement",
    "Mitigation",
];

/// Broad instrument class, used for price generation and payload wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Forex,
    Metal,
    Index,
}

impl SymbolKind {
    pub fn of(symbol: &str) -> Self {
        if symbol.contains("XAU") {
            SymbolKind::Metal
        } else if symbol.contains("US30") || symbol.contains("US100") {
            SymbolKind::Index
        } else {
            SymbolKind::Forex
        }
    }
}

/// Multiplier converting a raw price distance into pips (or points).
pub fn pip_multiplier(symbol: &str) -> f64 {
    match symbol {
        "USD/JPY" => 100.0,
        "XAU/USD" => 10.0,
        "US30/USD" | "US100/USD" => 1.0,
        _ => 10_000.0,
    }
}

/// Display precision for a symbol's prices.
pub fn price_decimals(symbol: &str) -> usize {
    match symbol {
        "USD/JPY" => 3,
        "XAU/USD" | "US30/USD" | "US100/USD" => 2,
        _ => 5,
    }
}

pub fn format_price(symbol: &str, price: f64) -> String {
    format!("{:.*}", price_decimals(symbol), price)
}

/// Unit name for a risk distance: indices move in points, the rest in pips.
pub fn risk_label(symbol: &str) -> &'static str {
    match SymbolKind::of(symbol) {
        SymbolKind::Index => "Points",
        _ => "Pips",
    }
}

pub fn is_known_symbol(symbol: &str) -> bool {
    AVAILABLE_SYMBOLS.contains(&symbol)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Directional stance of a setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    Bullish,
    Bearish,
}

impl Bias {
    pub fn is_bullish(&self) -> bool {
        matches!(self, Bias::Bullish)
    }

    /// Trade direction wording used in outbound signals.
    pub fn direction(&self) -> &'static str {
        match self {
            Bias::Bullish => "BUY",
            Bias::Bearish => "SELL",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Bullish => write!(f, "Bullish"),
            Bias::Bearish => write!(f, "Bearish"),
        }
    }
}

impl std::str::FromStr for Bias {
    type Err = SniperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bullish" | "buy" | "long" => Ok(Bias::Bullish),
            "bearish" | "sell" | "short" => Ok(Bias::Bearish),
            _ => Err(SniperError::InvalidInput(format!("unknown bias: {s}"))),
        }
    }
}

/// Chart timeframe, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    D1,
    H4,
    H1,
    M15,
    M5,
    M1,
}

impl Timeframe {
    /// Canonical ordering, highest timeframe first.
    pub const ORDER: [Timeframe; 6] = [
        Timeframe::D1,
        Timeframe::H4,
        Timeframe::H1,
        Timeframe::M15,
        Timeframe::M5,
        Timeframe::M1,
    ];

    /// Position in [`Timeframe::ORDER`]; lower is higher timeframe.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    pub fn is_higher_than(&self, other: Timeframe) -> bool {
        self.rank() < other.rank()
    }

    /// Compact chart label: `15m`, `4h`, `1d`.
    pub fn short_label(&self) -> &'static str {
        match self {
            Timeframe::D1 => "1d",
            Timeframe::H4 => "4h",
            Timeframe::H1 => "1h",
            Timeframe::M15 => "15m",
            Timeframe::M5 => "5m",
            Timeframe::M1 => "1m",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::D1 => "D1",
            Timeframe::H4 => "H4",
            Timeframe::H1 => "H1",
            Timeframe::M15 => "M15",
            Timeframe::M5 => "M5",
            Timeframe::M1 => "M1",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// One supporting rationale item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub concept: String,
    pub description: String,
}

/// Findings observed on a single timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    pub findings: Vec<Finding>,
}

/// A generated trade candidate. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub pair: String,
    pub bias: Bias,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub setup_timeframe: Timeframe,
    /// Ordered by timeframe, highest first.
    pub analysis: Vec<TimeframeAnalysis>,
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} @ {} (SL {} | TP {} | {})",
            self.id,
            self.pair,
            self.bias,
            format_price(&self.pair, self.entry_price),
            format_price(&self.pair, self.stop_loss),
            format_price(&self.pair, self.take_profit),
            self.setup_timeframe,
        )
    }
}

impl Opportunity {
    /// Findings on the setup timeframe (the confluences).
    pub fn setup_findings(&self) -> &[Finding] {
        self.analysis
            .iter()
            .find(|a| a.timeframe == self.setup_timeframe)
            .map(|a| a.findings.as_slice())
            .unwrap_or(&[])
    }

    pub fn confluence_count(&self) -> usize {
        self.setup_findings().len()
    }

    /// Whether any timeframe carries a finding for `concept`.
    pub fn has_concept(&self, concept: &str) -> bool {
        self.analysis
            .iter()
            .any(|a| a.findings.iter().any(|f| f.concept == concept))
    }

    /// Check the price-ordering and analysis invariants.
    pub fn validate(&self) -> Result<(), SniperError> {
        let ordered = match self.bias {
            Bias::Bullish => self.stop_loss < self.entry_price && self.entry_price < self.take_profit,
            Bias::Bearish => self.take_profit < self.entry_price && self.entry_price < self.stop_loss,
        };
        if !ordered {
            return Err(SniperError::InvalidOpportunity(format!(
                "{}: price levels out of order for {} bias",
                self.id, self.bias
            )));
        }
        if self.setup_findings().is_empty() {
            return Err(SniperError::InvalidOpportunity(format!(
                "{}: no findings on setup timeframe {}",
                self.id, self.setup_timeframe
            )));
        }
        Ok(())
    }
}

/// Per-pair higher-timeframe read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairMarketAnalysis {
    pub bias: Bias,
    pub analysis: Vec<TimeframeAnalysis>,
}

/// Market analysis keyed by pair symbol.
pub type MarketAnalysis = BTreeMap<String, PairMarketAnalysis>;

// ---------------------------------------------------------------------------
// Economic calendar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactLevel::High => write!(f, "High"),
            ImpactLevel::Medium => write!(f, "Medium"),
            ImpactLevel::Low => write!(f, "Low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityRating {
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
    Extreme,
}

/// Model-written explanation of a scheduled release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAnalysis {
    pub explanation: String,
    pub bullish_impact: String,
    pub bearish_impact: String,
    pub volatility_rating: VolatilityRating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub id: String,
    pub date: DateTime<Utc>,
    pub currency: String,
    pub impact: ImpactLevel,
    pub name: String,
    pub forecast: Option<String>,
    pub previous: Option<String>,
    pub actual: Option<String>,
    pub analysis: Option<EventAnalysis>,
    pub external_links: Vec<ExternalLink>,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
}

impl std::str::FromStr for TradeResult {
    type Err = SniperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "win" => Ok(TradeResult::Win),
            "loss" => Ok(TradeResult::Loss),
            _ => Err(SniperError::InvalidInput(format!("unknown trade result: {s}"))),
        }
    }
}

/// A closed trade, either from the journal or a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTrade {
    pub id: String,
    pub pair: String,
    pub bias: Bias,
    pub entry_price: f64,
    pub exit_price: f64,
    pub close_date: DateTime<Utc>,
    pub result: TradeResult,
    pub profit_or_loss: f64,
    pub notes: Option<String>,
    /// 1–5 stars.
    pub setup_quality: Option<u8>,
    /// 1–5 stars.
    pub execution_quality: Option<u8>,
    pub confluence_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Market sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MarketSession {
    pub name: &'static str,
    pub currencies: &'static [&'static str],
    pub open_utc: u32,
    pub close_utc: u32,
}

impl MarketSession {
    /// Whether the session is open at `utc_hour`. Handles windows that
    /// wrap past midnight (Sydney opens 22:00, closes 07:00).
    pub fn is_open(&self, utc_hour: u32) -> bool {
        if self.open_utc > self.close_utc {
            utc_hour >= self.open_utc || utc_hour < self.close_utc
        } else {
            utc_hour >= self.open_utc && utc_hour < self.close_utc
        }
    }
}

pub const MARKET_SESSIONS: &[MarketSession] = &[
    MarketSession { name: "Sydney", currencies: &["AUD", "NZD"], open_utc: 22, close_utc: 7 },
    MarketSession { name: "Tokyo", currencies: &["JPY"], open_utc: 0, close_utc: 9 },
    MarketSession { name: "London", currencies: &["GBP", "EUR"], open_utc: 8, close_utc: 17 },
    MarketSession { name: "New York", currencies: &["USD", "CAD"], open_utc: 13, close_utc: 22 },
];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SniperError {
    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Delivery failed for {pair}: {reason}")]
    Delivery { pair: String, reason: String },

    #[error("Invalid opportunity: {0}")]
    InvalidOpportunity(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Analyst error: {0}")]
    Analyst(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
