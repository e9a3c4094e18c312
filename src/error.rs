use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{store} unreachable: {reason}")]
    Unreachable { store: &'static str, reason: String },

    #[error("{store} returned a malformed response: {reason}")]
    Malformed { store: &'static str, reason: String },

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Metric record invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
