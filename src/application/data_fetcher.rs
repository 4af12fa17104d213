// Data fetcher - Single store query per call, no retries
use crate::application::error::PipelineError;
use crate::application::telemetry_store::TelemetryStore;
use crate::domain::telemetry::RawRecord;
use crate::domain::window::TimeWindow;
use std::sync::Arc;

#[derive(Clone)]
pub struct DataFetcher {
    store: Arc<dyn TelemetryStore>,
}

impl DataFetcher {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Raw records for `metric` inside `window`, in arrival order.
    /// `Ok(vec![])` means the query succeeded and matched nothing.
    pub async fn fetch(
        &self,
        window: &TimeWindow,
        metric: &str,
        value_field: &str,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        tracing::debug!(
            "Retrieving {}.{} from {} to {}",
            metric,
            value_field,
            window.start,
            window.end
        );

        let records = self.store.find(metric, window, value_field).await?;
        let outside = records.iter().filter(|r| !window.contains(r.timestamp)).count();
        if outside > 0 {
            tracing::warn!("{} {} records fall outside {:?}", outside, metric, window);
        }

        tracing::debug!("Got {} {} records for {}", records.len(), metric, window.date);
        Ok(records)
    }
}
