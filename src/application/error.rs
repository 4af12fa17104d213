// Pipeline error taxonomy
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store could not be reached or did not answer in time
    #[error("telemetry store unreachable: {0}")]
    Connectivity(String),

    /// The store answered but rejected the query
    #[error("telemetry store query failed: {0}")]
    Query(String),

    #[error("could not decode telemetry store response: {0}")]
    Decode(String),

    /// A wide column label did not carry a channel id after its prefix
    #[error("malformed channel label '{label}' (expected '{prefix}<id>')")]
    MalformedChannelLabel { label: String, prefix: String },

    #[error("aggregation task failed: {0}")]
    Aggregation(String),
}

impl PipelineError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PipelineError::Connectivity(_))
    }
}
