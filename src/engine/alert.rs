//! Auto-dismissing message slots.
//!
//! Both poll cycles write into the same slots; the last write wins and a
//! message disappears once its display time has elapsed.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Default display time of a poll notification.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Default display time of an action message.
pub const ACTION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Success,
    Error,
    Info,
}

/// One-line feedback for a user or autopilot action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionMessage {
    pub kind: ActionKind,
    pub text: String,
}

impl ActionMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: ActionKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: ActionKind::Error, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: ActionKind::Info, text: text.into() }
    }
}

/// Slot holding at most one value that expires after `ttl`.
#[derive(Debug)]
pub struct Transient<T> {
    ttl: Duration,
    entry: Option<(T, Instant)>,
    seq: u64,
}

impl<T: Clone> Transient<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None, seq: 0 }
    }

    /// Replace whatever is showing and restart the display timer.
    pub fn set(&mut self, value: T) -> u64 {
        self.seq += 1;
        self.entry = Some((value, Instant::now()));
        self.seq
    }

    /// The value, if it has not yet expired.
    pub fn current(&self) -> Option<T> {
        match &self.entry {
            Some((value, at)) if at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub fn dismiss(&mut self) {
        self.entry = None;
    }

    /// Number of writes so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
