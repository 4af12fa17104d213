// Domain layer - Telemetry models, windows and chart composition types
pub mod dashboard;
pub mod series;
pub mod telemetry;
pub mod window;
