// Query windows anchored at noon
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// Hour of day at which an observation day starts
pub const WINDOW_ANCHOR_HOUR: i64 = 12;

/// Half-open time range `[start, end)` for one observation day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub date: NaiveDate,
    #[serde(rename = "start_ms", with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(rename = "end_ms", with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window from `date` at 12:00 until the following day at 12:00 (UTC)
    pub fn for_date(date: NaiveDate) -> Self {
        let midnight = date.and_time(NaiveTime::default()).and_utc();
        let start = midnight + Duration::hours(WINDOW_ANCHOR_HOUR);
        Self {
            date,
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Outcome of resolving a requested date into a concrete window
#[derive(Debug, Clone, PartialEq)]
pub enum WindowResolution {
    /// Backward search disabled; the window was not probed
    Unprobed(TimeWindow),
    /// First window with data, `days_back` days before the requested date
    Found { window: TimeWindow, days_back: u32 },
    /// Every window in the lookback range was empty
    LookbackExhausted { requested: NaiveDate, attempts: u32 },
}
