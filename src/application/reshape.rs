// Wide to long reshaping of per-channel records
use crate::application::error::PipelineError;
use crate::domain::telemetry::{LongRow, RawRecord, ScalarPoint};
use serde::Deserialize;

/// Per-metric policy for dropping sensor readings that cannot be real
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct AnomalyFilter {
    /// Drop readings equal to zero
    #[serde(default)]
    pub drop_zero: bool,
    /// Keep only readings strictly inside `(lower, upper)`
    #[serde(default)]
    pub bounds: Option<(f64, f64)>,
}

impl AnomalyFilter {
    /// Valid range of the camera temperature and humidity sensors
    pub const SENSOR_BOUNDS: (f64, f64) = (-25.0, 250.0);

    pub fn none() -> Self {
        Self::default()
    }

    pub fn sensor_default() -> Self {
        Self {
            drop_zero: true,
            bounds: Some(Self::SENSOR_BOUNDS),
        }
    }

    pub fn accepts(&self, value: f64) -> bool {
        if self.drop_zero && value == 0.0 {
            return false;
        }
        match self.bounds {
            Some((lower, upper)) => value > lower && value < upper,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WideToLongTransformer {
    filter: AnomalyFilter,
}

impl WideToLongTransformer {
    pub fn new(filter: AnomalyFilter) -> Self {
        Self { filter }
    }

    /// One row per (record, channel column), sorted by timestamp.
    ///
    /// Columns are labelled `<channel_prefix><id>`; any other label is a data
    /// contract violation. The sort is stable so the column order of a record
    /// survives within its timestamp.
    pub fn transform(
        &self,
        records: Vec<RawRecord>,
        channel_prefix: &str,
    ) -> Result<Vec<LongRow>, PipelineError> {
        let channels = records.first().map(|r| r.columns.len()).unwrap_or(0);
        let mut rows = Vec::with_capacity(records.len() * channels);
        let mut dropped = 0usize;

        for record in records {
            for (label, value) in record.columns {
                let channel = parse_channel(&label, channel_prefix)?;
                if self.filter.accepts(value) {
                    rows.push(LongRow::new(record.timestamp, channel, value));
                } else {
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            tracing::debug!("Anomaly filter dropped {} readings", dropped);
        }

        rows.sort_by_key(|row| row.timestamp);
        Ok(rows)
    }
}

fn parse_channel(label: &str, prefix: &str) -> Result<u16, PipelineError> {
    label
        .strip_prefix(prefix)
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|id| id.parse::<u16>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| PipelineError::MalformedChannelLabel {
            label: label.to_string(),
            prefix: prefix.to_string(),
        })
}

/// Scalar readings of `value_field`, sorted by timestamp.
/// Records without that column are skipped.
pub fn to_scalar_points(records: Vec<RawRecord>, value_field: &str, drop_zero: bool) -> Vec<ScalarPoint> {
    let mut points: Vec<ScalarPoint> = records
        .into_iter()
        .filter_map(|record| {
            record
                .column(value_field)
                .map(|value| ScalarPoint::new(record.timestamp, value))
        })
        .filter(|point| !(drop_zero && point.value == 0.0))
        .collect();

    points.sort_by_key(|point| point.timestamp);
    points
}
