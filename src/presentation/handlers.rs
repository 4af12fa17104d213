// HTTP request handlers
use crate::application::error::PipelineError;
use crate::application::reshape::AnomalyFilter;
use crate::application::series_service::MetricQuery;
use crate::domain::dashboard::{LayoutSlot, PanelContent, PanelSkeleton};
use crate::infrastructure::ndjson_stream::stream_from_receiver;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub search_previous: Option<bool>,
    /// Caller identity; a newer request with the same session supersedes older ones
    pub session: Option<String>,
}

#[derive(Deserialize)]
pub struct SnapshotQuery {
    pub session: String,
}

#[derive(Deserialize, Default)]
pub struct SeriesParams {
    pub value_field: Option<String>,
    pub group: Option<String>,
    pub search_previous: Option<bool>,
    /// Shorthand for the zero / (-25, 250) sensor filter
    pub sensor_filter: Option<bool>,
    pub drop_zero: Option<bool>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub chunk_size: Option<usize>,
}

impl SeriesParams {
    fn query(self, metric: String) -> MetricQuery {
        let value_field = self.value_field.as_deref().unwrap_or("avg");
        let mut query = MetricQuery::new(&metric, value_field);

        if let Some(group) = self.group {
            query.group = group;
        }
        if let Some(chunk_size) = self.chunk_size {
            query.chunk_size = chunk_size;
        }
        query.anomaly_filter = if self.sensor_filter.unwrap_or(false) {
            AnomalyFilter::sensor_default()
        } else {
            AnomalyFilter {
                drop_zero: self.drop_zero.unwrap_or(false),
                bounds: self.lower.zip(self.upper),
            }
        };
        query
    }
}

#[derive(Serialize)]
pub struct PanelsResponse {
    pub panels: Vec<PanelSkeleton>,
    /// Metric to grid slot
    pub layout: HashMap<String, LayoutSlot>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Query(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Decode(_)
        | PipelineError::MalformedChannelLabel { .. }
        | PipelineError::Aggregation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: PipelineError) -> Response {
    (
        error_status(&error),
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Panel layout
pub async fn list_panels(State(state): State<Arc<AppState>>) -> Json<PanelsResponse> {
    let config = state.streaming_service.panels_config();
    Json(PanelsResponse {
        panels: config.panels.iter().map(|p| p.skeleton()).collect(),
        layout: config.layout(),
    })
}

/// Stream every panel for a date (progressive loading)
pub async fn stream_dashboard(
    Path(date): Path<NaiveDate>,
    Query(query): Query<DashboardQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let search_previous = query.search_previous.unwrap_or(true);
    let rx = state
        .streaming_service
        .stream_dashboard(query.session.as_deref(), date, search_previous)
        .await;
    stream_from_receiver(rx)
}

/// Latest applied result of one panel for a session
pub async fn panel_snapshot(
    Path(id): Path<String>,
    Query(query): Query<SnapshotQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if state.streaming_service.panels_config().find(&id).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state
        .streaming_service
        .panel_snapshot(&query.session, &id)
        .await
    {
        Some(snapshot) => Json(snapshot).into_response(),
        // configured but not loaded yet
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Single metric series, outside any configured panel
pub async fn get_series(
    Path((metric, date)): Path<(String, NaiveDate)>,
    Query(params): Query<SeriesParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let search_previous = params.search_previous.unwrap_or(true);
    let query = params.query(metric);

    match state
        .series_service
        .get_series(&query, date, search_previous)
        .await
    {
        Ok(outcome) => Json(PanelContent::from(outcome)).into_response(),
        Err(e) => {
            tracing::error!("Error fetching {} for {}: {}", query.metric, date, e);
            error_response(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregator::DEFAULT_CHUNK_SIZE;
    use crate::application::series_service::SeriesService;
    use crate::application::streaming_service::StreamingDashboardService;
    use crate::application::telemetry_store::testing::InMemoryStore;
    use crate::domain::dashboard::PanelKind;
    use crate::infrastructure::config::{PanelConfig, PanelsConfig};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn app_state(store: InMemoryStore) -> Arc<AppState> {
        let series_service = SeriesService::new(Arc::new(store));
        let panels = PanelsConfig {
            panels: vec![PanelConfig {
                id: "humidity".into(),
                title: "SCB humidity".into(),
                slot: LayoutSlot { row: 0, column: 0 },
                kind: PanelKind::Channels,
                metric: "scb_humidity".into(),
                value_field: "avg".into(),
                group: "channel".into(),
                y_label: None,
                anomaly_filter: None,
                chunk_size: DEFAULT_CHUNK_SIZE,
                auxiliary: Vec::new(),
            }],
        };
        Arc::new(AppState {
            streaming_service: StreamingDashboardService::new(series_service.clone(), panels),
            series_service,
        })
    }

    async fn snapshot_status(state: &Arc<AppState>, id: &str, session: &str) -> StatusCode {
        panel_snapshot(
            Path(id.to_string()),
            Query(SnapshotQuery {
                session: session.to_string(),
            }),
            State(state.clone()),
        )
        .await
        .status()
    }

    #[tokio::test]
    async fn test_panel_snapshot_statuses() {
        let state = app_state(InMemoryStore::new());

        assert_eq!(snapshot_status(&state, "nope", "desk").await, StatusCode::NOT_FOUND);
        assert_eq!(snapshot_status(&state, "humidity", "desk").await, StatusCode::NO_CONTENT);

        let mut rx = state
            .streaming_service
            .stream_dashboard(Some("desk"), date(), false)
            .await;
        while rx.recv().await.is_some() {}

        assert_eq!(snapshot_status(&state, "humidity", "desk").await, StatusCode::OK);
        assert_eq!(
            snapshot_status(&state, "humidity", "shifter").await,
            StatusCode::NO_CONTENT
        );
    }

    #[tokio::test]
    async fn test_series_maps_store_outage_to_service_unavailable() {
        let state = app_state(InMemoryStore::unreachable());

        let response = get_series(
            Path(("scb_humidity".to_string(), date())),
            Query(SeriesParams::default()),
            State(state),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_series_without_data_is_an_empty_panel() {
        let state = app_state(InMemoryStore::new());

        let response = get_series(
            Path(("scb_humidity".to_string(), date())),
            Query(SeriesParams {
                search_previous: Some(false),
                ..SeriesParams::default()
            }),
            State(state),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_series_params_defaults() {
        let query = SeriesParams::default().query("scb_humidity".into());

        assert_eq!(query.value_field, "avg");
        assert_eq!(query.channel_prefix(), "avg_");
        assert_eq!(query.anomaly_filter, AnomalyFilter::none());
        assert_eq!(query.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_series_params_need_both_bounds() {
        let params = SeriesParams {
            drop_zero: Some(true),
            lower: Some(-25.0),
            ..SeriesParams::default()
        };
        assert_eq!(params.query("x".into()).anomaly_filter.bounds, None);

        let params = SeriesParams {
            drop_zero: Some(true),
            lower: Some(-25.0),
            upper: Some(250.0),
            ..SeriesParams::default()
        };
        assert_eq!(
            params.query("x".into()).anomaly_filter,
            AnomalyFilter::sensor_default()
        );
    }

    #[test]
    fn test_sensor_filter_shorthand() {
        let params = SeriesParams {
            sensor_filter: Some(true),
            group: Some("module".into()),
            ..SeriesParams::default()
        };
        let query = params.query("anode_current".into());

        assert_eq!(query.anomaly_filter, AnomalyFilter::sensor_default());
        assert_eq!(query.group, "module");
    }

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(&PipelineError::Connectivity("refused".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&PipelineError::MalformedChannelLabel {
                label: "avg_x".into(),
                prefix: "avg_".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
