//! Forex market session clock.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;

use crate::types::{MarketSession, MARKET_SESSIONS};

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    #[serde(flatten)]
    pub session: MarketSession,
    pub is_open: bool,
}

/// Open/closed state of every session at `now`. All sessions are closed
/// on Saturdays.
pub fn session_statuses(now: DateTime<Utc>) -> Vec<SessionStatus> {
    let weekend = now.weekday() == Weekday::Sat;
    MARKET_SESSIONS
        .iter()
        .map(|s| SessionStatus {
            session: s.clone(),
            is_open: !weekend && s.is_open(now.hour()),
        })
        .collect()
}

/// Names of the sessions open at `now`, e.g. the London/New York overlap.
pub fn open_sessions(now: DateTime<Utc>) -> Vec<&'static str> {
    session_statuses(now)
        .into_iter()
        .filter(|s| s.is_open)
        .map(|s| s.session.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_london_new_york_overlap() {
        // Monday
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        assert_eq!(open_sessions(now), vec!["London", "New York"]);
    }

    #[test]
    fn test_sydney_and_tokyo_overnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 3, 0, 0).unwrap();
        assert_eq!(open_sessions(now), vec!["Sydney", "Tokyo"]);
    }

    #[test]
    fn test_saturday_closed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 14, 0, 0).unwrap();
        assert!(open_sessions(now).is_empty());
        assert_eq!(session_statuses(now).len(), MARKET_SESSIONS.len());
    }
}
