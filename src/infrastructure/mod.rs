// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod influx_store;
pub mod ndjson_stream;
