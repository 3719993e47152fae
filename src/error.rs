use thiserror::Error;

/// Stampede application error types
///
/// Everything here is fatal at startup or during orchestration. Per-request
/// failures (bad statuses, timeouts, malformed bodies) never appear in this
/// taxonomy: they are absorbed into the error-rate metric by the driver.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("Invalid threshold expression {input:?}: {reason}")]
    InvalidThreshold { input: String, reason: String },

    #[error("Invalid request for {action}: {reason}")]
    InvalidRequest { action: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty stage plan: at least one stage is required")]
    EmptyStagePlan,
}

impl Error {
    pub fn invalid_duration(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_threshold(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidThreshold {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
