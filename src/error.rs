use thiserror::Error;

/// Scalar Kalman update failures. Both indicate a modelling bug, not bad input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("{signal}: measurement at {timestamp}s is older than filter state at {last}s")]
    TimeReversal {
        signal: &'static str,
        timestamp: f64,
        last: f64,
    },

    #[error("{signal}: degenerate innovation covariance {covariance}")]
    DegenerateCovariance { signal: &'static str, covariance: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid axis map entry: {0}")]
    InvalidAxisMap(String),

    #[error("Invalid axis inversion entry: {0}")]
    InvalidInversion(String),

    #[error("Unknown delivery policy: {0}")]
    UnknownPolicy(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Filter failed: {0}")]
    Filter(#[from] FilterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stage {0} panicked")]
    StagePanicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
