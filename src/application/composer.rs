// Series composer - Lays base, envelope and auxiliary series on one time axis
use crate::domain::series::{AuxiliaryInput, AuxiliaryLayer, AuxiliaryRole, SeriesBundle, TimeRange};
use crate::domain::telemetry::{AggregateRow, LongRow};
use chrono::Duration;
use std::collections::BTreeMap;

/// Padding added on each side of the observed range for the x axis limits
pub const X_LIMIT_PADDING_HOURS: i64 = 1;

pub struct SeriesComposer;

impl SeriesComposer {
    /// Assemble the layers of one chart. No resampling happens here: gaps in
    /// any series stay gaps.
    ///
    /// Thresholds become a constant line over the base series' range, events
    /// become markers as tall as the envelope's highest value.
    pub fn compose(
        base: Vec<LongRow>,
        envelope: Vec<AggregateRow>,
        auxiliary: BTreeMap<String, AuxiliaryInput>,
    ) -> SeriesBundle {
        let base_range = TimeRange::spanning(base.iter().map(|r| r.timestamp));
        let peak = envelope
            .iter()
            .map(|a| a.max)
            .fold(None, |peak: Option<f64>, max| Some(peak.map_or(max, |p| p.max(max))));

        let mut layers = BTreeMap::new();
        for (name, input) in auxiliary {
            if input.points.is_empty() {
                continue;
            }
            match Self::layer(input, base_range, peak) {
                Some(layer) => {
                    layers.insert(name, layer);
                }
                None => tracing::debug!("Skipping threshold {} - no base series to span", name),
            }
        }

        let time_range = base_range.or_else(|| {
            TimeRange::spanning(layers.values().flat_map(|layer| match layer {
                AuxiliaryLayer::Line { points } => points.iter().map(|p| p.timestamp).collect(),
                AuxiliaryLayer::EventMarkers { timestamps, .. } => timestamps.clone(),
                AuxiliaryLayer::ReferenceLine { .. } => Vec::new(),
            }))
        });

        SeriesBundle {
            base,
            envelope,
            auxiliary: layers,
            x_limits: time_range.map(|r| r.padded(Duration::hours(X_LIMIT_PADDING_HOURS))),
            time_range,
        }
    }

    fn layer(
        input: AuxiliaryInput,
        base_range: Option<TimeRange>,
        peak: Option<f64>,
    ) -> Option<AuxiliaryLayer> {
        match input.role {
            AuxiliaryRole::Threshold => {
                let range = base_range?;
                let value = input
                    .points
                    .iter()
                    .map(|p| p.value)
                    .fold(f64::NEG_INFINITY, f64::max);
                Some(AuxiliaryLayer::ReferenceLine {
                    value,
                    start: range.start,
                    end: range.end,
                })
            }
            AuxiliaryRole::Events => Some(AuxiliaryLayer::EventMarkers {
                timestamps: input.points.iter().map(|p| p.timestamp).collect(),
                height: peak,
            }),
            AuxiliaryRole::Line => Some(AuxiliaryLayer::Line {
                points: input.points,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregator::ChunkedAggregator;
    use crate::domain::telemetry::ScalarPoint;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap()
    }

    fn base() -> Vec<LongRow> {
        vec![
            LongRow::new(t(13), 1, 10.0),
            LongRow::new(t(13), 2, 40.0),
            LongRow::new(t(15), 1, 12.0),
            LongRow::new(t(18), 2, 30.0),
        ]
    }

    #[test]
    fn test_threshold_spans_base_range_not_its_own() {
        let base = base();
        let envelope = ChunkedAggregator::default().aggregate(&base);
        let mut auxiliary = BTreeMap::new();
        auxiliary.insert(
            "L1 Rate Max".to_string(),
            AuxiliaryInput::new(
                AuxiliaryRole::Threshold,
                vec![ScalarPoint::new(t(1), 90.0), ScalarPoint::new(t(23), 120.0)],
            ),
        );

        let bundle = SeriesComposer::compose(base, envelope, auxiliary);

        assert_eq!(
            bundle.auxiliary["L1 Rate Max"],
            AuxiliaryLayer::ReferenceLine {
                value: 120.0,
                start: t(13),
                end: t(18)
            }
        );
        assert_eq!(bundle.time_range, Some(TimeRange { start: t(13), end: t(18) }));
        assert_eq!(bundle.x_limits, Some(TimeRange { start: t(12), end: t(19) }));
    }

    #[test]
    fn test_events_become_markers_at_envelope_peak() {
        let base = base();
        let envelope = ChunkedAggregator::default().aggregate(&base);
        let mut auxiliary = BTreeMap::new();
        auxiliary.insert(
            "L0 Rate Control".to_string(),
            AuxiliaryInput::new(
                AuxiliaryRole::Events,
                vec![ScalarPoint::new(t(14), 1.0), ScalarPoint::new(t(16), 1.0)],
            ),
        );

        let bundle = SeriesComposer::compose(base, envelope, auxiliary);

        assert_eq!(
            bundle.auxiliary["L0 Rate Control"],
            AuxiliaryLayer::EventMarkers {
                timestamps: vec![t(14), t(16)],
                height: Some(40.0)
            }
        );
    }

    #[test]
    fn test_threshold_without_base_is_omitted() {
        let mut auxiliary = BTreeMap::new();
        auxiliary.insert(
            "L0 Rate Max".to_string(),
            AuxiliaryInput::new(AuxiliaryRole::Threshold, vec![ScalarPoint::new(t(14), 5.0)]),
        );

        let bundle = SeriesComposer::compose(Vec::new(), Vec::new(), auxiliary);

        assert!(bundle.is_empty());
        assert!(bundle.time_range.is_none());
    }

    #[test]
    fn test_line_series_keep_gaps_and_set_range() {
        let points = vec![ScalarPoint::new(t(12), 3.0), ScalarPoint::new(t(20), 4.0)];
        let mut auxiliary = BTreeMap::new();
        auxiliary.insert(
            "busy".to_string(),
            AuxiliaryInput::new(AuxiliaryRole::Line, points.clone()),
        );
        auxiliary.insert(
            "camera".to_string(),
            AuxiliaryInput::new(AuxiliaryRole::Line, Vec::new()),
        );

        let bundle = SeriesComposer::compose(Vec::new(), Vec::new(), auxiliary);

        assert_eq!(bundle.auxiliary.len(), 1);
        assert_eq!(bundle.auxiliary["busy"], AuxiliaryLayer::Line { points });
        assert_eq!(bundle.time_range, Some(TimeRange { start: t(12), end: t(20) }));
    }
}
