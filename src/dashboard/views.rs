//! Dashboard views.
//!
//! Each page of the dashboard is one `View` variant. Builders take the
//! data their page needs as explicit arguments; the route layer collects
//! it from the shared state and picks the builder by `ViewKind`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use crate::backtest::BacktestParams;
use crate::config::AccountConfig;
use crate::data::calendar::{self, NewsWarning};
use crate::data::correlation::CorrelationMatrix;
use crate::data::history::{self, JournalStats, TradeFilter};
use crate::data::sessions::{self, SessionStatus};
use crate::storage::daily::DailyPrep;
use crate::strategy::risk::{confidence_pct, RiskPlan};
use crate::types::{
    Bias, ChecklistItem, EconomicEvent, HistoricalTrade, MarketAnalysis, Opportunity, SniperError,
    TradeResult, AVAILABLE_SYMBOLS, SMC_CONCEPTS,
};

// ---------------------------------------------------------------------------
// View selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Opportunities,
    Analysis,
    Calendar,
    Backtest,
    TradingPrep,
    Journal,
    Favorites,
    Watchlist,
    Correlation,
}

impl ViewKind {
    pub const ALL: [ViewKind; 9] = [
        ViewKind::Opportunities,
        ViewKind::Analysis,
        ViewKind::Calendar,
        ViewKind::Backtest,
        ViewKind::TradingPrep,
        ViewKind::Journal,
        ViewKind::Favorites,
        ViewKind::Watchlist,
        ViewKind::Correlation,
    ];
}

impl FromStr for ViewKind {
    type Err = SniperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opportunities" => Ok(ViewKind::Opportunities),
            "analysis" => Ok(ViewKind::Analysis),
            "calendar" => Ok(ViewKind::Calendar),
            "backtest" => Ok(ViewKind::Backtest),
            "tradingprep" | "trading-prep" => Ok(ViewKind::TradingPrep),
            "journal" => Ok(ViewKind::Journal),
            "favorites" => Ok(ViewKind::Favorites),
            "watchlist" => Ok(ViewKind::Watchlist),
            "correlation" => Ok(ViewKind::Correlation),
            _ => Err(SniperError::NotFound(format!("view {s}"))),
        }
    }
}

/// Query parameters shared by the filterable views. `All` (or absent)
/// disables a criterion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub pair: Option<String>,
    pub bias: Option<String>,
    pub concept: Option<String>,
    pub result: Option<String>,
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty() && *v != "All")
}

impl ViewQuery {
    pub fn opportunity_filter(&self) -> Result<OpportunityFilter, SniperError> {
        Ok(OpportunityFilter {
            pair: criterion(&self.pair).map(str::to_string),
            bias: criterion(&self.bias).map(str::parse::<Bias>).transpose()?,
            concept: criterion(&self.concept).map(str::to_string),
        })
    }

    pub fn trade_filter(&self) -> Result<TradeFilter, SniperError> {
        Ok(TradeFilter {
            pair: criterion(&self.pair).map(str::to_string),
            result: criterion(&self.result).map(str::parse::<TradeResult>).transpose()?,
        })
    }
}

/// Pair / bias / concept filter over the opportunity feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityFilter {
    pub pair: Option<String>,
    pub bias: Option<Bias>,
    /// Matches a finding on any timeframe.
    pub concept: Option<String>,
}

impl OpportunityFilter {
    pub fn matches(&self, opp: &Opportunity) -> bool {
        self.pair.as_deref().map_or(true, |p| opp.pair == p)
            && self.bias.map_or(true, |b| opp.bias == b)
            && self.concept.as_deref().map_or(true, |c| opp.has_concept(c))
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// What a card needs besides the opportunity itself.
pub struct CardContext<'a> {
    pub favorites: &'a BTreeSet<String>,
    pub alerts: &'a HashSet<String>,
    pub events: &'a [EconomicEvent],
    pub account: AccountConfig,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityCard {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub is_favorite: bool,
    pub alert_active: bool,
    pub confluences: usize,
    pub confidence_pct: u32,
    pub risk_reward: String,
    pub risk: RiskPlan,
    /// High-impact release for this pair in the next 24 hours.
    pub news_warning: Option<EconomicEvent>,
}

impl OpportunityCard {
    pub fn build(opp: &Opportunity, ctx: &CardContext<'_>) -> Self {
        let risk = RiskPlan::precise(opp, ctx.account.balance, ctx.account.risk_pct);
        Self {
            opportunity: opp.clone(),
            is_favorite: ctx.favorites.contains(&opp.id),
            alert_active: ctx.alerts.contains(&opp.id),
            confluences: opp.confluence_count(),
            confidence_pct: confidence_pct(opp.confluence_count()),
            risk_reward: risk.ratio_label(),
            risk,
            news_warning: calendar::upcoming_high_impact_for(ctx.events, &opp.pair, ctx.now).cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchlistEntry {
    pub pair: String,
    pub alert_enabled: bool,
    /// Higher-timeframe bias, once market analysis has loaded.
    pub bias: Option<Bias>,
    pub open_opportunities: usize,
    pub latest_opportunity_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum View {
    Opportunities {
        news_warning: Option<NewsWarning>,
        pairs: &'static [&'static str],
        concepts: &'static [&'static str],
        opportunities: Vec<OpportunityCard>,
    },
    Analysis {
        loading: bool,
        analysis: Option<MarketAnalysis>,
    },
    Calendar {
        loading: bool,
        events: Vec<EconomicEvent>,
    },
    Backtest {
        pairs: &'static [&'static str],
        defaults: BacktestParams,
    },
    TradingPrep {
        date: NaiveDate,
        completion_pct: f64,
        checklist: Vec<ChecklistItem>,
        journal: String,
        sessions: Vec<SessionStatus>,
    },
    Journal {
        loading: bool,
        stats: JournalStats,
        trades: Vec<HistoricalTrade>,
    },
    Favorites {
        opportunities: Vec<OpportunityCard>,
    },
    Watchlist {
        available: Vec<&'static str>,
        entries: Vec<WatchlistEntry>,
    },
    Correlation {
        pairs: Vec<String>,
        matrix: CorrelationMatrix,
    },
}

impl View {
    pub fn opportunities(
        book: &[Opportunity],
        filter: &OpportunityFilter,
        cards: &CardContext<'_>,
    ) -> Self {
        View::Opportunities {
            news_warning: calendar::next_high_impact(cards.events, cards.now),
            pairs: AVAILABLE_SYMBOLS,
            concepts: SMC_CONCEPTS,
            opportunities: book
                .iter()
                .filter(|o| filter.matches(o))
                .map(|o| OpportunityCard::build(o, cards))
                .collect(),
        }
    }

    pub fn analysis(analysis: Option<MarketAnalysis>) -> Self {
        View::Analysis {
            loading: analysis.is_none(),
            analysis,
        }
    }

    pub fn calendar(events: Option<Vec<EconomicEvent>>) -> Self {
        View::Calendar {
            loading: events.is_none(),
            events: events.unwrap_or_default(),
        }
    }

    pub fn backtest(today: NaiveDate) -> Self {
        View::Backtest {
            pairs: AVAILABLE_SYMBOLS,
            defaults: default_backtest_params(today),
        }
    }

    pub fn trading_prep(prep: &DailyPrep, now: DateTime<Utc>) -> Self {
        View::TradingPrep {
            date: prep.date(),
            completion_pct: prep.completion_pct(),
            checklist: prep.checklist().to_vec(),
            journal: prep.journal().to_string(),
            sessions: sessions::session_statuses(now),
        }
    }

    pub fn journal(trades: Option<&[HistoricalTrade]>, filter: &TradeFilter) -> Self {
        let Some(trades) = trades else {
            return View::Journal {
                loading: true,
                stats: JournalStats::default(),
                trades: Vec::new(),
            };
        };
        let filtered = history::filter_trades(trades, filter);
        View::Journal {
            loading: false,
            stats: history::journal_stats(filtered.iter().copied()),
            trades: filtered.into_iter().cloned().collect(),
        }
    }

    pub fn favorites(book: &[Opportunity], cards: &CardContext<'_>) -> Self {
        View::Favorites {
            opportunities: book
                .iter()
                .filter(|o| cards.favorites.contains(&o.id))
                .map(|o| OpportunityCard::build(o, cards))
                .collect(),
        }
    }

    pub fn watchlist(
        watchlist: &[String],
        alert_pairs: &BTreeSet<String>,
        book: &[Opportunity],
        analysis: Option<&MarketAnalysis>,
    ) -> Self {
        let entries = watchlist
            .iter()
            .map(|pair| {
                let mut on_pair = book.iter().filter(|o| &o.pair == pair);
                let latest = on_pair.next();
                WatchlistEntry {
                    pair: pair.clone(),
                    alert_enabled: alert_pairs.contains(pair),
                    bias: analysis.and_then(|a| a.get(pair)).map(|p| p.bias),
                    open_opportunities: latest.map_or(0, |_| 1 + on_pair.count()),
                    latest_opportunity_id: latest.map(|o| o.id.clone()),
                }
            })
            .collect();

        View::Watchlist {
            available: AVAILABLE_SYMBOLS
                .iter()
                .copied()
                .filter(|s| !watchlist.iter().any(|w| w == s))
                .collect(),
            entries,
        }
    }

    pub fn correlation(pairs: Vec<String>, matrix: CorrelationMatrix) -> Self {
        View::Correlation { pairs, matrix }
    }
}

pub fn default_backtest_params(today: NaiveDate) -> BacktestParams {
    BacktestParams {
        pair: AVAILABLE_SYMBOLS[0].to_string(),
        start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(today),
        end_date: today,
        initial_balance: 10_000.0,
        risk_pct: 1.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
