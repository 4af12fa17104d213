// InfluxDB store implementation
use crate::application::error::PipelineError;
use crate::application::telemetry_store::TelemetryStore;
use crate::domain::telemetry::RawRecord;
use crate::domain::window::TimeWindow;
use crate::infrastructure::config::StoreSettings;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Reads telemetry documents over the InfluxQL HTTP API.
///
/// Documents live in one measurement, tagged with `name` = metric. Channel
/// metrics store one field per channel (`avg_1 .. avg_N`), scalar metrics a
/// single field (`avg`).
#[derive(Debug, Clone)]
pub struct InfluxStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
    measurement: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxStore {
    pub fn new(settings: &StoreSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .timeout(Duration::from_millis(settings.query_timeout_ms))
            .build()
            .context("Failed to build HTTP client for InfluxDB")?;

        Ok(Self {
            client,
            base_url: settings.base_url(),
            database: settings.database.clone(),
            measurement: settings.measurement.clone(),
            token: settings.token.clone(),
        })
    }

    fn build_query_url(&self, query: &str) -> String {
        format!(
            "{}/query?db={}&q={}",
            self.base_url,
            urlencoding::encode(&self.database),
            urlencoding::encode(query)
        )
    }

    /// `SELECT` of `value_field` and its per-channel fields for `metric` in `[start, end)`
    fn select_statement(
        &self,
        metric: &str,
        window: &TimeWindow,
        value_field: &str,
        limit: Option<usize>,
    ) -> Result<String, PipelineError> {
        if value_field.is_empty()
            || !value_field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PipelineError::Query(format!(
                "invalid value field '{}'",
                value_field
            )));
        }

        let mut query = format!(
            "SELECT /^{}(_[0-9]+)?$/ FROM \"{}\" WHERE \"name\" = '{}' AND time >= '{}' AND time < '{}'",
            value_field,
            self.measurement.replace('"', "\\\""),
            metric.replace('\\', "\\\\").replace('\'', "\\'"),
            window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(query)
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse, PipelineError> {
        let url = self.build_query_url(query);
        tracing::debug!("Executing InfluxQL: {}", query);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Connectivity(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Query(format!(
                "InfluxDB answered {}: {}",
                status, body
            )));
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .map_err(|e| PipelineError::Decode(e.to_string()))?;

        if let Some(error) = data.results.first().and_then(|r| r.error.as_ref()) {
            return Err(PipelineError::Query(error.clone()));
        }

        Ok(data)
    }
}

/// Turn InfluxQL rows into wide records; null fields are left out
fn records_from_response(response: InfluxQLResponse) -> Result<Vec<RawRecord>, PipelineError> {
    let mut records = Vec::new();
    let Some(series_list) = response.results.into_iter().next().and_then(|r| r.series) else {
        return Ok(records);
    };

    for series in series_list {
        let time_idx = series
            .columns
            .iter()
            .position(|c| c == "time")
            .ok_or_else(|| PipelineError::Decode("series without time column".into()))?;

        for row in series.values {
            let time = row
                .get(time_idx)
                .and_then(|v| v.as_str())
                .ok_or_else(|| PipelineError::Decode("row without timestamp".into()))?;
            let timestamp = DateTime::parse_from_rfc3339(time)
                .map_err(|e| PipelineError::Decode(format!("bad timestamp '{}': {}", time, e)))?
                .with_timezone(&Utc);

            let columns = series
                .columns
                .iter()
                .zip(row.iter())
                .enumerate()
                .filter(|(idx, _)| *idx != time_idx)
                .filter_map(|(_, (label, value))| value.as_f64().map(|v| (label.clone(), v)))
                .collect();

            records.push(RawRecord::new(timestamp, columns));
        }
    }

    Ok(records)
}

#[async_trait]
impl TelemetryStore for InfluxStore {
    async fn find(
        &self,
        metric: &str,
        window: &TimeWindow,
        value_field: &str,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        let query = self.select_statement(metric, window, value_field, None)?;
        let response = self.execute_query(&query).await?;
        records_from_response(response)
    }

    async fn has_data(
        &self,
        metric: &str,
        window: &TimeWindow,
        value_field: &str,
    ) -> Result<bool, PipelineError> {
        let query = self.select_statement(metric, window, value_field, Some(1))?;
        let response = self.execute_query(&query).await?;
        Ok(!records_from_response(response)?.is_empty())
    }
}
