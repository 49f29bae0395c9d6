//! Economic calendar generation and event queries.

use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::types::{EconomicEvent, ExternalLink, ImpactLevel, SymbolKind};

/// Days covered, starting today.
pub const CALENDAR_DAYS: u64 = 5;

/// Horizon of the headline high-impact warning.
pub const WARNING_HORIZON_HOURS: i64 = 12;

/// Horizon of the per-opportunity high-impact flag.
pub const OPPORTUNITY_HORIZON_HOURS: i64 = 24;

/// Minutes before a release when the no-trade window opens.
pub const NO_TRADE_WINDOW_MINUTES: i64 = 30;

const EVENT_NAMES: &[(&str, &[&str])] = &[
    ("USD", &["Non-Farm Payrolls", "CPI m/m", "Fed Interest Rate Decision", "Retail Sales m/m", "Unemployment Claims"]),
    ("EUR", &["ECB Main Refinancing Rate", "German Flash Manufacturing PMI", "CPI Flash Estimate y/y", "German IFO Business Climate"]),
    ("GBP", &["BOE Monetary Policy Report", "CPI y/y", "Claimant Count Change", "GDP m/m"]),
    ("JPY", &["BOJ Policy Rate", "Tokyo Core CPI y/y", "Tankan Manufacturing Index"]),
    ("AUD", &["RBA Rate Statement", "Employment Change", "Retail Sales m/m"]),
    ("CAD", &["BOC Rate Statement", "Employment Change", "CPI m/m"]),
    ("CHF", &["SNB Policy Rate", "Manufacturing PMI", "Unemployment Rate"]),
    ("NZD", &["RBNZ Rate Statement", "GDP q/q", "Visitor Arrivals m/m"]),
];

/// Skewed towards the higher impact levels.
const IMPACT_WEIGHTS: &[ImpactLevel] = &[
    ImpactLevel::High,
    ImpactLevel::High,
    ImpactLevel::Medium,
    ImpactLevel::Medium,
    ImpactLevel::Medium,
    ImpactLevel::Low,
];

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Events for today and the following days, 3–7 per day, sorted by date.
/// Releases earlier today than `now` are dropped.
pub fn generate_events<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Vec<EconomicEvent> {
    let batch = Uuid::new_v4().simple().to_string();
    let mut events = Vec::new();

    for day in 0..CALENDAR_DAYS {
        let Some(date) = now.date_naive().checked_add_days(Days::new(day)) else {
            continue;
        };
        let count = rng.gen_range(3..=7);

        for i in 0..count {
            let Some(&(currency, names)) = EVENT_NAMES.choose(rng) else {
                continue;
            };
            let Some(&name) = names.choose(rng) else {
                continue;
            };
            let impact = IMPACT_WEIGHTS.choose(rng).copied().unwrap_or(ImpactLevel::Medium);

            let hour = rng.gen_range(0..18);
            let minute = rng.gen_range(0..4) * 15;
            let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
                continue;
            };
            let at = Utc.from_utc_datetime(&naive);
            if day == 0 && at < now {
                continue;
            }

            events.push(EconomicEvent {
                id: format!("event-{day}-{i}-{batch}"),
                date: at,
                currency: currency.to_string(),
                impact,
                name: name.to_string(),
                forecast: Some(format!("{:.1}%", rng.gen::<f64>() * 5.0)),
                previous: Some(format!("{:.1}%", rng.gen::<f64>() * 5.0)),
                actual: None,
                analysis: None,
                external_links: reference_links(name),
            });
        }
    }

    events.sort_by_key(|e| e.date);
    events
}

/// Lowercase, whitespace to dashes, anything else non-word dropped.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

fn reference_links(name: &str) -> Vec<ExternalLink> {
    let encoded = urlencoding::encode(name);
    let link = |site: &str, url: String| ExternalLink { name: site.to_string(), url };

    vec![
        link("Investing.com", format!("https://www.investing.com/economic-calendar/{}", slugify(name))),
        link("Myfxbook", format!("https://www.myfxbook.com/forex-economic-calendar?search={encoded}")),
        link("Forex Factory", format!("https://www.google.com/search?q=site:forexfactory.com+{encoded}")),
        link("DailyFX", format!("https://www.dailyfx.com/search?q={encoded}")),
    ]
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Headline warning for the next high-impact release.
#[derive(Debug, Clone, Serialize)]
pub struct NewsWarning {
    pub event: EconomicEvent,
    pub trade_window_start: DateTime<Utc>,
    pub seconds_remaining: i64,
    /// `HH:MM:SS` until the release.
    pub countdown: String,
    /// Whether `now` is already inside the no-trade window.
    pub in_no_trade_window: bool,
}

/// Next High-impact event within the warning horizon.
pub fn next_high_impact(events: &[EconomicEvent], now: DateTime<Utc>) -> Option<NewsWarning> {
    let horizon = now + Duration::hours(WARNING_HORIZON_HOURS);

    let event = events
        .iter()
        .filter(|e| e.impact == ImpactLevel::High && e.date > now && e.date <= horizon)
        .min_by_key(|e| e.date)?;

    let trade_window_start = event.date - Duration::minutes(NO_TRADE_WINDOW_MINUTES);
    let seconds_remaining = (event.date - now).num_seconds().max(0);

    Some(NewsWarning {
        event: event.clone(),
        trade_window_start,
        seconds_remaining,
        countdown: format_countdown(seconds_remaining),
        in_no_trade_window: now >= trade_window_start,
    })
}

pub fn format_countdown(seconds: i64) -> String {
    if seconds <= 0 {
        return "00:00:00".to_string();
    }
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

fn pair_currencies(pair: &str) -> Vec<&str> {
    pair.split('/').collect()
}

/// Upcoming events for either side of `pair`, soonest first.
pub fn relevant_events<'a>(events: &'a [EconomicEvent], pair: &str, now: DateTime<Utc>) -> Vec<&'a EconomicEvent> {
    let currencies = pair_currencies(pair);
    let mut out: Vec<&EconomicEvent> = events
        .iter()
        .filter(|e| currencies.contains(&e.currency.as_str()) && e.date > now)
        .collect();
    out.sort_by_key(|e| e.date);
    out
}

/// First High-impact release in the next 24 hours touching a forex pair.
/// Metals and indices are never flagged.
pub fn upcoming_high_impact_for<'a>(
    events: &'a [EconomicEvent],
    pair: &str,
    now: DateTime<Utc>,
) -> Option<&'a EconomicEvent> {
    if SymbolKind::of(pair) != SymbolKind::Forex {
        return None;
    }
    let horizon = now + Duration::hours(OPPORTUNITY_HORIZON_HOURS);
    let currencies = pair_currencies(pair);
    events.iter().find(|e| {
        currencies.contains(&e.currency.as_str())
            && e.impact == ImpactLevel::High
            && e.date > now
            && e.date <= horizon
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
