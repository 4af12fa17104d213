use crate::application::aggregator::DEFAULT_CHUNK_SIZE;
use crate::application::reshape::AnomalyFilter;
use crate::application::series_service::MetricQuery;
use crate::domain::dashboard::{LayoutSlot, PanelKind, PanelSkeleton};
use crate::domain::series::AuxiliaryRole;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub measurement: String,
    #[serde(default)]
    pub token: Option<String>,
    pub connect_timeout_ms: u64,
    pub query_timeout_ms: u64,
}

impl StoreSettings {
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
    pub allowed_origin: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelsConfig {
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

impl PanelsConfig {
    pub fn find(&self, id: &str) -> Option<&PanelConfig> {
        self.panels.iter().find(|p| p.id == id)
    }

    /// Declarative metric to grid position mapping
    pub fn layout(&self) -> HashMap<String, LayoutSlot> {
        self.panels
            .iter()
            .map(|p| (p.metric.clone(), p.slot))
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelConfig {
    pub id: String,
    pub title: String,
    pub slot: LayoutSlot,
    pub kind: PanelKind,
    pub metric: String,
    pub value_field: String,
    #[serde(default = "default_group")]
    pub group: String,
    pub y_label: Option<String>,
    #[serde(default)]
    pub anomaly_filter: Option<AnomalyFilter>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub auxiliary: Vec<AuxiliaryConfig>,
}

impl PanelConfig {
    pub fn query(&self) -> MetricQuery {
        MetricQuery {
            metric: self.metric.clone(),
            value_field: self.value_field.clone(),
            group: self.group.clone(),
            anomaly_filter: self.anomaly_filter.unwrap_or_default(),
            chunk_size: self.chunk_size,
            envelope: self.kind == PanelKind::Channels,
        }
    }

    pub fn skeleton(&self) -> PanelSkeleton {
        PanelSkeleton {
            id: self.id.clone(),
            title: self.title.clone(),
            kind: self.kind,
            slot: self.slot,
            group: self.group.clone(),
            y_label: self.y_label.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuxiliaryConfig {
    pub name: String,
    pub metric: String,
    pub value_field: String,
    pub role: AuxiliaryRole,
    #[serde(default)]
    pub drop_zero: bool,
}

fn default_group() -> String {
    "channel".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Built-in defaults, then `config/app.toml`, then the deployment's environment
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let env = |key: &str| std::env::var(key).ok();

    let settings = config::Config::builder()
        .set_default("store.host", "localhost")?
        .set_default("store.port", 3333)?
        .set_default("store.database", "db_name")?
        .set_default("store.measurement", "telemetry")?
        .set_default("store.connect_timeout_ms", 5000)?
        .set_default("store.query_timeout_ms", 30000)?
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("server.allowed_origin", "localhost")?
        .add_source(config::File::with_name("config/app").required(false))
        .set_override_option("store.host", env("DB_HOST"))?
        .set_override_option("store.port", env("DB_PORT"))?
        .set_override_option("store.database", env("DB_NAME"))?
        .set_override_option("server.allowed_origin", env("WEBSOCKET_ORIGIN"))?
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_panels_config() -> anyhow::Result<PanelsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/panels"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
