//! Throttle scheduling: when a re-evaluation request actually runs.
//!
//! [`ThrottleState`] is the pure decision half. It never touches timers; the
//! watcher turns a [`Decision::Defer`] into a one-shot timer and calls
//! [`ThrottleState::fire`] when it goes off.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::time::Instant;

use crate::error::{ConfigError, Result};

/// Interval used when throttling is enabled without an explicit value.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(11);

/// Throttle setting for one watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Throttle {
    /// Every request evaluates synchronously.
    Disabled,
    /// Throttled at [`DEFAULT_INTERVAL`].
    #[default]
    Enabled,
    /// Throttled at the given interval.
    Interval(Duration),
}

impl Throttle {
    /// Minimum spacing between evaluations, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Throttle::Disabled => None,
            Throttle::Enabled => Some(DEFAULT_INTERVAL),
            Throttle::Interval(interval) => Some(*interval),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Throttle::Disabled)
    }

    /// Interpret a loosely-typed throttle value.
    ///
    /// `true`/`null` enable the default interval, `false` and `0` disable,
    /// any other non-negative number is an interval in milliseconds.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Throttle::Enabled),
            Value::Bool(true) => Ok(Throttle::Enabled),
            Value::Bool(false) => Ok(Throttle::Disabled),
            Value::Number(n) => {
                if let Some(ms) = n.as_u64() {
                    return Ok(Throttle::from(ms));
                }
                match n.as_f64() {
                    Some(ms) if ms.is_finite() && ms == 0.0 => Ok(Throttle::Disabled),
                    Some(ms) if ms.is_finite() && ms > 0.0 => Duration::try_from_secs_f64(ms / 1000.0)
                        .map(Throttle::Interval)
                        .map_err(|_| ConfigError::InvalidThrottle(n.to_string())),
                    _ => Err(ConfigError::InvalidThrottle(n.to_string())),
                }
            }
            other => Err(ConfigError::InvalidThrottle(other.to_string())),
        }
    }
}

impl From<bool> for Throttle {
    fn from(enabled: bool) -> Self {
        if enabled {
            Throttle::Enabled
        } else {
            Throttle::Disabled
        }
    }
}

/// Milliseconds. Zero disables throttling.
impl From<u64> for Throttle {
    fn from(ms: u64) -> Self {
        if ms == 0 {
            Throttle::Disabled
        } else {
            Throttle::Interval(Duration::from_millis(ms))
        }
    }
}

impl From<Duration> for Throttle {
    fn from(interval: Duration) -> Self {
        Throttle::Interval(interval)
    }
}

impl<'de> Deserialize<'de> for Throttle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Throttle::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// What to do with a single re-evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Evaluate synchronously now.
    RunNow,
    /// A deferred evaluation is already outstanding and covers this request.
    Coalesce,
    /// Schedule one deferred evaluation after the delay.
    Defer(Duration),
}

/// Per-watcher throttle bookkeeping.
#[derive(Debug, Clone)]
pub struct ThrottleState {
    interval: Option<Duration>,
    last_run_at: Option<Instant>,
    pending: bool,
}

impl ThrottleState {
    pub fn new(throttle: Throttle) -> Self {
        Self {
            interval: throttle.interval(),
            last_run_at: None,
            pending: false,
        }
    }

    pub fn request(&mut self, now: Instant) -> Decision {
        let Some(interval) = self.interval else {
            return Decision::RunNow;
        };
        if self.pending {
            return Decision::Coalesce;
        }

        let elapsed = self
            .last_run_at
            .map(|last| now.saturating_duration_since(last));
        match elapsed {
            Some(elapsed) if elapsed < interval => {
                self.pending = true;
                Decision::Defer(interval - elapsed)
            }
            _ => {
                self.last_run_at = Some(now);
                Decision::RunNow
            }
        }
    }

    /// The deferred timer went off; the evaluation runs right after this.
    pub fn fire(&mut self, now: Instant) {
        self.pending = false;
        self.last_run_at = Some(now);
    }

    /// Forget an outstanding deferred evaluation whose timer was cancelled.
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn last_run_at(&self) -> Option<Instant> {
        self.last_run_at
    }
}
