// Application layer - Retrieval and aggregation pipeline, dashboard orchestration
pub mod aggregator;
pub mod composer;
pub mod data_fetcher;
pub mod error;
pub mod reshape;
pub mod series_service;
pub mod streaming_service;
pub mod telemetry_store;
pub mod window_resolver;
