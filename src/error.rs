use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualizerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Live data unavailable for {repo}: {reason}")]
    LiveDataUnavailable {
        repo: String,
        reason: LiveDataFailure,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a live fetch could not produce runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiveDataFailure {
    #[error("rate limited by the API")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("repository not found or not public")]
    NotFound,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl VisualizerError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn live(repo: impl Into<String>, reason: LiveDataFailure) -> Self {
        Self::LiveDataUnavailable {
            repo: repo.into(),
            reason,
        }
    }

    /// True for failures the user can fix by editing the configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, VisualizerError>;
