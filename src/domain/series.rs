// Composite chart model shared by every panel
use super::telemetry::{AggregateRow, LongRow, ScalarPoint};
use super::window::TimeWindow;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NO_DATA_MESSAGE: &str = "There is no available data in the selected date";

/// How an auxiliary scalar series is laid over the base chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryRole {
    /// Fixed reference value drawn as a horizontal line
    Threshold,
    /// Timestamps of discrete events, drawn as spikes
    Events,
    /// Plain time series sharing the axis
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryInput {
    pub role: AuxiliaryRole,
    pub points: Vec<ScalarPoint>,
}

impl AuxiliaryInput {
    pub fn new(role: AuxiliaryRole, points: Vec<ScalarPoint>) -> Self {
        Self { role, points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    #[serde(rename = "start_ms", with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(rename = "end_ms", with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Smallest range covering every timestamp, `None` when there are none
    pub fn spanning<I>(timestamps: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        timestamps.into_iter().fold(None, |range, ts| match range {
            None => Some(Self { start: ts, end: ts }),
            Some(r) => Some(Self {
                start: r.start.min(ts),
                end: r.end.max(ts),
            }),
        })
    }

    pub fn padded(&self, padding: Duration) -> Self {
        Self {
            start: self.start - padding,
            end: self.end + padding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuxiliaryLayer {
    ReferenceLine {
        value: f64,
        #[serde(rename = "start_ms", with = "chrono::serde::ts_milliseconds")]
        start: DateTime<Utc>,
        #[serde(rename = "end_ms", with = "chrono::serde::ts_milliseconds")]
        end: DateTime<Utc>,
    },
    EventMarkers {
        #[serde(rename = "times_ms", serialize_with = "serialize_millis")]
        timestamps: Vec<DateTime<Utc>>,
        height: Option<f64>,
    },
    Line {
        points: Vec<ScalarPoint>,
    },
}

fn serialize_millis<S>(timestamps: &[DateTime<Utc>], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(timestamps.iter().map(|ts| ts.timestamp_millis()))
}

/// Independently togglable layers on one time axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesBundle {
    pub base: Vec<LongRow>,
    pub envelope: Vec<AggregateRow>,
    pub auxiliary: BTreeMap<String, AuxiliaryLayer>,
    pub time_range: Option<TimeRange>,
    /// `time_range` widened by an hour on each side
    pub x_limits: Option<TimeRange>,
}

impl SeriesBundle {
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.envelope.is_empty() && self.auxiliary.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EmptyReason {
    NoDataInWindow { window: TimeWindow },
    LookbackExhausted { requested: NaiveDate, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesOutcome {
    Bundle {
        window: TimeWindow,
        days_back: u32,
        /// What the ids in `bundle.base` count (`channel`, `module`)
        group: String,
        bundle: SeriesBundle,
    },
    Empty(EmptyReason),
}
