// Chunked min/max/avg aggregation per timestamp
use crate::domain::telemetry::{AggregateRow, LongRow};

pub const DEFAULT_CHUNK_SIZE: usize = 300_000;

/// Separator between tied channel ids in `max_channel` / `min_channel`
pub const CHANNEL_SEPARATOR: &str = ",";

/// Computes the envelope of a long table in fixed-size chunks.
///
/// Rows must be sorted by timestamp. The rows of the last timestamp in a chunk
/// may continue in the next one, so that group is carried over and only
/// summarised once a later timestamp shows up (or the input ends). Every
/// timestamp therefore yields exactly one [`AggregateRow`] whatever the chunk
/// size.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedAggregator {
    chunk_size: usize,
}

impl Default for ChunkedAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedAggregator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn aggregate(&self, rows: &[LongRow]) -> Vec<AggregateRow> {
        let mut aggregates = Vec::new();
        let mut pending: Vec<LongRow> = Vec::new();

        for chunk in rows.chunks(self.chunk_size) {
            pending.extend_from_slice(chunk);

            let Some(last) = pending.last().map(|row| row.timestamp) else {
                continue;
            };
            let boundary = pending
                .iter()
                .rposition(|row| row.timestamp != last)
                .map_or(0, |idx| idx + 1);

            aggregates.extend(
                pending[..boundary]
                    .chunk_by(|a, b| a.timestamp == b.timestamp)
                    .map(summarize),
            );
            pending.drain(..boundary);
        }

        if !pending.is_empty() {
            aggregates.push(summarize(&pending));
        }

        tracing::debug!(
            "Aggregated {} rows into {} timestamps (chunk size {})",
            rows.len(),
            aggregates.len(),
            self.chunk_size
        );
        aggregates
    }
}

/// Envelope of one non-empty group of rows sharing a timestamp
fn summarize(group: &[LongRow]) -> AggregateRow {
    let timestamp = group[0].timestamp;
    let max = group.iter().map(|r| r.value).fold(f64::NEG_INFINITY, f64::max);
    let min = group.iter().map(|r| r.value).fold(f64::INFINITY, f64::min);
    let avg = group.iter().map(|r| r.value).sum::<f64>() / group.len() as f64;

    AggregateRow {
        timestamp,
        max,
        min,
        avg,
        max_channel: channels_at(group, max),
        min_channel: channels_at(group, min),
    }
}

fn channels_at(group: &[LongRow], target: f64) -> String {
    let mut channels: Vec<u16> = group
        .iter()
        .filter(|r| r.value == target)
        .map(|r| r.channel)
        .collect();
    channels.sort_unstable();
    channels.dedup();

    channels
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(CHANNEL_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(second: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 14, 12, 0, 0).unwrap() + Duration::seconds(second)
    }

    fn row(second: i64, channel: u16, value: f64) -> LongRow {
        LongRow::new(t(second), channel, value)
    }

    /// Deterministic pseudo-random dataset with uneven group sizes
    fn dataset() -> Vec<LongRow> {
        let mut rows = Vec::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for second in 0..40 {
            let channels = 1 + (second % 7) as u16;
            for channel in 1..=channels {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let value = (seed % 50) as f64 / 2.0;
                rows.push(row(second, channel, value));
            }
        }
        rows
    }

    #[test]
    fn test_two_timestamps_example() {
        let rows = vec![row(1, 1, 10.0), row(1, 2, 20.0), row(2, 1, 5.0)];

        let aggregates = ChunkedAggregator::new(2).aggregate(&rows);

        assert_eq!(
            aggregates,
            vec![
                AggregateRow {
                    timestamp: t(1),
                    max: 20.0,
                    min: 10.0,
                    avg: 15.0,
                    max_channel: "2".into(),
                    min_channel: "1".into(),
                },
                AggregateRow {
                    timestamp: t(2),
                    max: 5.0,
                    min: 5.0,
                    avg: 5.0,
                    max_channel: "1".into(),
                    min_channel: "1".into(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(ChunkedAggregator::new(3).aggregate(&[]).is_empty());
    }

    #[test]
    fn test_chunk_size_independence() {
        let rows = dataset();
        let single_pass = ChunkedAggregator::new(rows.len()).aggregate(&rows);
        assert_eq!(single_pass.len(), 40);

        for chunk_size in 1..=rows.len() + 1 {
            assert_eq!(
                ChunkedAggregator::new(chunk_size).aggregate(&rows),
                single_pass,
                "chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_group_spilling_past_chunk_is_one_row() {
        let chunk_size = 4;
        let mut rows: Vec<LongRow> = (1..=chunk_size as u16)
            .map(|channel| row(0, channel, f64::from(channel)))
            .collect();
        rows.push(row(0, 5, 5.0));

        let aggregates = ChunkedAggregator::new(chunk_size).aggregate(&rows);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].max, 5.0);
        assert_eq!(aggregates[0].max_channel, "5");
        assert_eq!(aggregates[0].avg, 3.0);
    }

    #[test]
    fn test_group_spanning_several_chunks() {
        let mut rows = vec![row(0, 1, 1.0)];
        rows.extend((1..=7).map(|channel| row(1, channel, 2.0)));
        rows.push(row(2, 1, 3.0));

        let aggregates = ChunkedAggregator::new(2).aggregate(&rows);

        let times: Vec<_> = aggregates.iter().map(|a| a.timestamp).collect();
        assert_eq!(times, vec![t(0), t(1), t(2)]);
        assert_eq!(aggregates[1].max_channel, "1,2,3,4,5,6,7");
    }

    #[test]
    fn test_ties_are_joined_in_ascending_order() {
        let rows = vec![
            row(0, 9, 30.0),
            row(0, 2, 10.0),
            row(0, 4, 30.0),
            row(0, 11, 10.0),
            row(0, 1, 20.0),
        ];

        let aggregates = ChunkedAggregator::default().aggregate(&rows);

        assert_eq!(aggregates[0].max_channel, "4,9");
        assert_eq!(aggregates[0].min_channel, "2,11");
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let rows = vec![row(0, 1, 1.0), row(0, 2, 3.0)];
        let aggregator = ChunkedAggregator::new(0);

        assert_eq!(aggregator.chunk_size, 1);
        assert_eq!(aggregator.aggregate(&rows).len(), 1);
    }

    #[test]
    fn test_every_aggregate_timestamp_comes_from_input() {
        let rows = dataset();
        let aggregates = ChunkedAggregator::new(5).aggregate(&rows);

        for aggregate in &aggregates {
            assert!(rows.iter().any(|r| r.timestamp == aggregate.timestamp));
        }
    }
}
