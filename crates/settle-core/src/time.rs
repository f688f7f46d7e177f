//! Time windows and the open-ended period sentinel.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::codes::Resolution;
use crate::error::{SettleError, SettleResult};

/// Epoch seconds of 9999-01-01T00:00:00Z.
const SENTINEL_END_SECS: i64 = 253_370_764_800;

/// The "valid until further notice" end date of the last period in a partition.
pub fn sentinel_end() -> DateTime<Utc> {
    DateTime::from_timestamp(SENTINEL_END_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Half-open interval `[start, end)` used as the aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> SettleResult<Self> {
        if end <= start {
            return Err(SettleError::Validation(format!(
                "time window end {end} is not after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// Width of the fixed aggregation buckets, anchored at the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowWidth {
    seconds: i64,
}

impl WindowWidth {
    pub fn hourly() -> Self {
        Self { seconds: 3600 }
    }

    pub fn from_seconds(seconds: i64) -> SettleResult<Self> {
        if seconds <= 0 {
            return Err(SettleError::Validation(format!(
                "window width must be positive, got {seconds}s"
            )));
        }
        Ok(Self { seconds })
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// The window containing `instant`: `start = floor(instant, width)`, `end = start + width`.
    pub fn window_for(&self, instant: DateTime<Utc>) -> SettleResult<TimeWindow> {
        let ts = instant.timestamp();
        let start_secs = floor_bucket(ts, self.seconds);
        let start = DateTime::from_timestamp(start_secs, 0).ok_or_else(|| {
            SettleError::Validation(format!("timestamp {instant} cannot be bucketed"))
        })?;
        let end = start
            .checked_add_signed(self.duration())
            .ok_or_else(|| SettleError::Validation(format!("window after {start} overflows")))?;
        Ok(TimeWindow { start, end })
    }
}

impl Default for WindowWidth {
    fn default() -> Self {
        Self::hourly()
    }
}

impl From<Resolution> for WindowWidth {
    fn from(resolution: Resolution) -> Self {
        Self {
            seconds: resolution.duration().num_seconds(),
        }
    }
}

fn floor_bucket(ts: i64, period: i64) -> i64 {
    ts - ts.rem_euclid(period)
}
