// Series service - One generic resolve, fetch, reshape, aggregate, compose pipeline
use crate::application::aggregator::{ChunkedAggregator, DEFAULT_CHUNK_SIZE};
use crate::application::composer::SeriesComposer;
use crate::application::data_fetcher::DataFetcher;
use crate::application::error::PipelineError;
use crate::application::reshape::{to_scalar_points, AnomalyFilter, WideToLongTransformer};
use crate::application::telemetry_store::TelemetryStore;
use crate::application::window_resolver::TimeWindowResolver;
use crate::domain::dashboard::PanelKind;
use crate::domain::series::{AuxiliaryInput, EmptyReason, SeriesOutcome};
use crate::domain::telemetry::{AggregateRow, LongRow, ScalarPoint};
use crate::domain::window::{TimeWindow, WindowResolution};
use crate::infrastructure::config::{AuxiliaryConfig, PanelConfig};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything that distinguishes one metric's pipeline from another's
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub metric: String,
    pub value_field: String,
    /// Name of the grouping variable (`channel`, `module`)
    pub group: String,
    pub anomaly_filter: AnomalyFilter,
    pub chunk_size: usize,
    /// Whether the min/max/avg envelope is computed
    pub envelope: bool,
}

impl MetricQuery {
    pub fn new(metric: &str, value_field: &str) -> Self {
        Self {
            metric: metric.to_string(),
            value_field: value_field.to_string(),
            group: "channel".to_string(),
            anomaly_filter: AnomalyFilter::none(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            envelope: true,
        }
    }

    pub fn channel_prefix(&self) -> String {
        format!("{}_", self.value_field)
    }
}

enum Resolved {
    Window { window: TimeWindow, days_back: u32 },
    Empty(EmptyReason),
}

#[derive(Clone)]
pub struct SeriesService {
    resolver: TimeWindowResolver,
    fetcher: DataFetcher,
}

impl SeriesService {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            resolver: TimeWindowResolver::new(store.clone()),
            fetcher: DataFetcher::new(store),
        }
    }

    /// Per-channel series of one metric for the day containing `date`
    pub async fn get_series(
        &self,
        query: &MetricQuery,
        date: NaiveDate,
        search_previous: bool,
    ) -> Result<SeriesOutcome, PipelineError> {
        let (window, days_back) = match self.resolve(query, date, search_previous).await? {
            Resolved::Window { window, days_back } => (window, days_back),
            Resolved::Empty(reason) => return Ok(SeriesOutcome::Empty(reason)),
        };

        let (base, envelope) = self.channel_layers(query, &window).await?;
        if base.is_empty() {
            return Ok(SeriesOutcome::Empty(EmptyReason::NoDataInWindow { window }));
        }

        Ok(SeriesOutcome::Bundle {
            window,
            days_back,
            group: query.group.clone(),
            bundle: SeriesComposer::compose(base, envelope, BTreeMap::new()),
        })
    }

    /// Complete chart model for one configured panel
    pub async fn get_panel(
        &self,
        panel: &PanelConfig,
        date: NaiveDate,
        search_previous: bool,
    ) -> Result<SeriesOutcome, PipelineError> {
        let query = panel.query();
        let (window, days_back) = match self.resolve(&query, date, search_previous).await? {
            Resolved::Window { window, days_back } => (window, days_back),
            Resolved::Empty(reason) => return Ok(SeriesOutcome::Empty(reason)),
        };

        let (base, envelope) = match panel.kind {
            PanelKind::Channels | PanelKind::Status => self.channel_layers(&query, &window).await?,
            PanelKind::Rates => (Vec::new(), Vec::new()),
        };

        // Auxiliary series follow the window the main metric resolved to
        let mut auxiliary = BTreeMap::new();
        for aux in &panel.auxiliary {
            auxiliary.insert(aux.name.clone(), self.auxiliary(aux, &window).await?);
        }

        let bundle = SeriesComposer::compose(base, envelope, auxiliary);
        if bundle.is_empty() {
            return Ok(SeriesOutcome::Empty(EmptyReason::NoDataInWindow { window }));
        }

        Ok(SeriesOutcome::Bundle {
            window,
            days_back,
            group: query.group,
            bundle,
        })
    }

    async fn resolve(
        &self,
        query: &MetricQuery,
        date: NaiveDate,
        search_previous: bool,
    ) -> Result<Resolved, PipelineError> {
        let resolution = self
            .resolver
            .resolve(date, search_previous, &query.metric, &query.value_field)
            .await?;

        Ok(match resolution {
            WindowResolution::Unprobed(window) => Resolved::Window {
                window,
                days_back: 0,
            },
            WindowResolution::Found { window, days_back } => Resolved::Window { window, days_back },
            WindowResolution::LookbackExhausted {
                requested,
                attempts,
            } => Resolved::Empty(EmptyReason::LookbackExhausted {
                requested,
                attempts,
            }),
        })
    }

    async fn channel_layers(
        &self,
        query: &MetricQuery,
        window: &TimeWindow,
    ) -> Result<(Vec<LongRow>, Vec<AggregateRow>), PipelineError> {
        let records = self
            .fetcher
            .fetch(window, &query.metric, &query.value_field)
            .await?;
        if records.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let base = WideToLongTransformer::new(query.anomaly_filter)
            .transform(records, &query.channel_prefix())?;
        if !query.envelope || base.is_empty() {
            return Ok((base, Vec::new()));
        }

        // Aggregation is CPU bound and sequential within one metric
        let aggregator = ChunkedAggregator::new(query.chunk_size);
        let (base, envelope) = tokio::task::spawn_blocking(move || {
            let envelope = aggregator.aggregate(&base);
            (base, envelope)
        })
        .await
        .map_err(|e| PipelineError::Aggregation(e.to_string()))?;

        tracing::debug!(
            "{}: {} {} rows, {} envelope rows",
            query.metric,
            base.len(),
            query.group,
            envelope.len()
        );
        Ok((base, envelope))
    }

    /// Single-valued series (rates, limits, control flags) sorted by time
    pub async fn get_scalar_series(
        &self,
        metric: &str,
        window: &TimeWindow,
        value_field: &str,
        drop_zero: bool,
    ) -> Result<Vec<ScalarPoint>, PipelineError> {
        let records = self.fetcher.fetch(window, metric, value_field).await?;
        Ok(to_scalar_points(records, value_field, drop_zero))
    }

    async fn auxiliary(
        &self,
        aux: &AuxiliaryConfig,
        window: &TimeWindow,
    ) -> Result<AuxiliaryInput, PipelineError> {
        let points = self
            .get_scalar_series(&aux.metric, window, &aux.value_field, aux.drop_zero)
            .await?;
        Ok(AuxiliaryInput::new(aux.role, points))
    }
}
