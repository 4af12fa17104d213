// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One store document in wide format: a timestamp plus one column per channel.
///
/// Channel metrics carry labels like `avg_1 .. avg_N`, scalar metrics a single
/// column named after the value field.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub timestamp: DateTime<Utc>,
    pub columns: Vec<(String, f64)>,
}

impl RawRecord {
    pub fn new(timestamp: DateTime<Utc>, columns: Vec<(String, f64)>) -> Self {
        Self { timestamp, columns }
    }

    pub fn column(&self, label: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| *value)
    }
}

/// One (timestamp, channel) reading in long format
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LongRow {
    #[serde(rename = "time_ms", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub channel: u16,
    pub value: f64,
}

impl LongRow {
    pub fn new(timestamp: DateTime<Utc>, channel: u16, value: f64) -> Self {
        Self {
            timestamp,
            channel,
            value,
        }
    }
}

/// Envelope of all channels at one timestamp.
///
/// `max_channel` / `min_channel` hold every channel id reaching the extreme,
/// ascending and comma separated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(rename = "time_ms", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub max_channel: String,
    pub min_channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalarPoint {
    #[serde(rename = "time_ms", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl ScalarPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}
