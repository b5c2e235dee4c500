//! Error types for contentgen.
//!
//! Library crates use [`ContentGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all contentgen operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentGenError {
    /// Configuration loading or validation error (bad key, unknown provider, ...).
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed input model or an input-contract violation found by a logic block.
    #[error("structural error: {message}")]
    Structural { message: String },

    /// The generation backend failed (network, 5xx, malformed envelope).
    #[error("generation error: {0}")]
    Generation(String),

    /// The generation backend asked us to slow down.
    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// A single stage attempt exceeded its time budget.
    #[error("stage '{stage}' timed out after {timeout_ms} ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// A produced fragment did not satisfy its schema.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Generated text or an input file could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Pipeline state misuse (double write, missing upstream output).
    #[error("pipeline state error: {message}")]
    State { message: String },

    /// The run was cancelled between stages.
    #[error("cancelled")]
    Cancelled,

    /// Unknown or already-evicted job identifier.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentGenError>;

impl ContentGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a structural error from any displayable message.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural {
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

    /// Create a pipeline state error from any displayable message.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State {
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

    /// Whether this error must abort the run instead of entering the retry path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Structural { .. }
                | Self::State { .. }
                | Self::Cancelled
                | Self::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ContentGenError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ContentGenError::Timeout {
            stage: "faq".into(),
            timeout_ms: 500,
        };
        assert!(err.to_string().contains("'faq' timed out after 500 ms"));
    }

    #[test]
    fn fatal_classification() {
        assert!(ContentGenError::structural("no benefits").is_fatal());
        assert!(ContentGenError::state("double write").is_fatal());
        assert!(ContentGenError::Cancelled.is_fatal());

        assert!(!ContentGenError::Generation("503".into()).is_fatal());
        assert!(!ContentGenError::RateLimited { retry_after_ms: None }.is_fatal());
        assert!(!ContentGenError::validation("too few").is_fatal());
        assert!(!ContentGenError::parse("not json").is_fatal());
        assert!(!ContentGenError::JobNotFound("x".into()).is_fatal());
    }
}
