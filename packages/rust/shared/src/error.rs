//! Error types for Prospector.
//!
//! Library crates use [`ProspectorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Expected, per-record failures (a homepage that cannot be fetched, a single
//! failed completion attempt) are not errors at this level: they are modelled
//! as outcome values by the component that produces them.

use std::path::PathBuf;

/// Top-level error type for all Prospector operations.
#[derive(Debug, thiserror::Error)]
pub enum ProspectorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the sheet or completion endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed payload (JSON, CSV) from an external collaborator.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Tabular persistence error (CSV file or remote sheet).
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (record invariant broken, missing column, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A completion stage never produced usable content within its retry budget
    /// and the run was configured to abort on that condition.
    #[error("completion retries exhausted for {url} at stage {stage} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        stage: String,
        attempts: u32,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProspectorError>;

impl ProspectorError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProspectorError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ProspectorError::validation("summary populated before content");
        assert!(err.to_string().contains("summary populated"));
    }

    #[test]
    fn retries_exhausted_names_record_and_stage() {
        let err = ProspectorError::RetriesExhausted {
            url: "https://a.test".into(),
            stage: "response2".into(),
            attempts: 15,
        };
        let msg = err.to_string();
        assert!(msg.contains("https://a.test"));
        assert!(msg.contains("response2"));
        assert!(msg.contains("15 attempts"));
    }
}
