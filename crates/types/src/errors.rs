//! Error types for the analysis engine

use thiserror::Error;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Main error type for the analysis engine
///
/// Per-entry data problems (missing fields, malformed content) never become
/// errors; they are absorbed with defaults at the extraction point. Only
/// upstream connectivity, bad explicit arguments, and lookup misses surface
/// here.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no {kind} entry found with id '{id}'")]
    NotFound { kind: String, id: String },

    #[error("action '{action}' is not supported for {kind} entries")]
    UnsupportedAction { action: String, kind: String },

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("entry store unavailable: {source}")]
    Store { source: anyhow::Error },

    #[error("cache tier unavailable: {source}")]
    Cache { source: anyhow::Error },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnalysisError {
    /// Structured not-found for a detail lookup
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        AnalysisError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Action requested on a kind that does not support it
    pub fn unsupported_action(action: impl Into<String>, kind: impl Into<String>) -> Self {
        AnalysisError::UnsupportedAction {
            action: action.into(),
            kind: kind.into(),
        }
    }

    /// Malformed explicit argument
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Entry store connectivity failure
    pub fn store(source: impl Into<anyhow::Error>) -> Self {
        AnalysisError::Store {
            source: source.into(),
        }
    }

    /// Cache tier connectivity failure
    pub fn cache(source: impl Into<anyhow::Error>) -> Self {
        AnalysisError::Cache {
            source: source.into(),
        }
    }

    /// Configuration validation failure
    pub fn configuration(reason: impl Into<String>) -> Self {
        AnalysisError::Configuration {
            reason: reason.into(),
        }
    }

    /// True when the failure came from an upstream dependency rather than
    /// the request itself
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AnalysisError::Store { .. } | AnalysisError::Cache { .. }
        )
    }
}
