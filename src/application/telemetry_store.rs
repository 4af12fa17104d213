// Store trait for telemetry data access
use crate::application::error::PipelineError;
use crate::domain::telemetry::RawRecord;
use crate::domain::window::TimeWindow;
use async_trait::async_trait;

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Every document named `metric` inside `window`, projected to `value_field`.
    /// Records come back in arrival order.
    async fn find(
        &self,
        metric: &str,
        window: &TimeWindow,
        value_field: &str,
    ) -> Result<Vec<RawRecord>, PipelineError>;

    /// Whether at least one document named `metric` exists inside `window`
    async fn has_data(
        &self,
        metric: &str,
        window: &TimeWindow,
        value_field: &str,
    ) -> Result<bool, PipelineError>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store keyed by metric name
    #[derive(Default)]
    pub struct InMemoryStore {
        documents: Vec<(String, RawRecord)>,
        unreachable: bool,
        probes: AtomicUsize,
        finds: AtomicUsize,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        pub fn with(mut self, metric: &str, record: RawRecord) -> Self {
            self.documents.push((metric.to_string(), record));
            self
        }

        pub fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }

        pub fn finds(&self) -> usize {
            self.finds.load(Ordering::SeqCst)
        }

        fn matching(&self, metric: &str, window: &TimeWindow, value_field: &str) -> Vec<RawRecord> {
            let channel_prefix = format!("{}_", value_field);
            self.documents
                .iter()
                .filter(|(name, record)| name == metric && window.contains(record.timestamp))
                .map(|(_, record)| {
                    let columns = record
                        .columns
                        .iter()
                        .filter(|(label, _)| label == value_field || label.starts_with(&channel_prefix))
                        .cloned()
                        .collect();
                    RawRecord::new(record.timestamp, columns)
                })
                .filter(|record| !record.columns.is_empty())
                .collect()
        }
    }

    #[async_trait]
    impl TelemetryStore for InMemoryStore {
        async fn find(
            &self,
            metric: &str,
            window: &TimeWindow,
            value_field: &str,
        ) -> Result<Vec<RawRecord>, PipelineError> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(PipelineError::Connectivity("connection refused".into()));
            }
            Ok(self.matching(metric, window, value_field))
        }

        async fn has_data(
            &self,
            metric: &str,
            window: &TimeWindow,
            value_field: &str,
        ) -> Result<bool, PipelineError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(PipelineError::Connectivity("connection refused".into()));
            }
            Ok(!self.matching(metric, window, value_field).is_empty())
        }
    }
}
