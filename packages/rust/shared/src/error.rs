//! Error types for Sidequest.
//!
//! Library crates use [`SidequestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Sidequest operations.
#[derive(Debug, thiserror::Error)]
pub enum SidequestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a source or the generation backend.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed payload (JSON, HTML, or generation output).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The generation backend rejected or failed the request.
    #[error("generation error: {0}")]
    Generation(String),

    /// The generation backend asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A bounded call did not finish in time.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// A single named experience source failed.
    #[error("source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// Every configured source failed for a city.
    #[error("all experience sources failed for '{0}'")]
    SourcesExhausted(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Request or data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SidequestError>;

impl SidequestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Attribute a failure to a named source.
    pub fn source_failure(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Network(_) | Self::Timeout(_)
        )
    }
}
