//! Panel real-time clock.
//!
//! Not running until set, either from the host's system time at boot or by
//! the console `set time` command. Uptime counts from construction.

use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Wire format for time values.
pub const ISO8601: &str = "%Y-%m-%dT%H:%M:%SZ";

const EARLIEST_YEAR: i32 = 2022;
const LATEST_YEAR: i32 = 2055;

#[derive(Debug)]
pub struct Clock {
    started: Instant,
    /// Wall time at the moment it was set
    base: Mutex<Option<(DateTime<Utc>, Instant)>>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            base: Mutex::new(None),
        }
    }

    /// A clock already running from the system time.
    pub fn from_system() -> Self {
        let clock = Self::new();
        clock.set(Utc::now());
        clock
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.base.lock() = Some((time, Instant::now()));
    }

    pub fn is_running(&self) -> bool {
        self.base.lock().is_some()
    }

    /// Current wall time, or `None` before the clock is set.
    pub fn now(&self) -> Option<DateTime<Utc>> {
        let (time, at) = (*self.base.lock())?;
        let elapsed = TimeDelta::from_std(at.elapsed()).unwrap_or(TimeDelta::zero());
        Some(time + elapsed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a wall time the way the `Device Time` value carries it.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(ISO8601).to_string()
}

/// Parse a `set time` argument such as `2023-06-01T12:30:00Z`.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), ISO8601).map_err(|_| {
        Error::InvalidTime(format!(
            "Invalid time {}. Expected YYYY-MM-DDTHH:MM:SSZ",
            text.trim()
        ))
    })?;

    let year = naive.year();
    if !(EARLIEST_YEAR..=LATEST_YEAR).contains(&year) {
        return Err(Error::InvalidTime(format!(
            "Invalid year {:04}. Must be between {} and {}",
            year, EARLIEST_YEAR, LATEST_YEAR
        )));
    }
    Ok(naive.and_utc())
}
