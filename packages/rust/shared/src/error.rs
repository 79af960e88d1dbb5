//! Error types for doctidy.
//!
//! Library crates use [`DocTidyError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all doctidy operations.
#[derive(Debug, thiserror::Error)]
pub enum DocTidyError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input that cannot be read as a documentation page.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad rule table, invalid path, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Rendering a record or report to its persisted form failed.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocTidyError>;

impl DocTidyError {
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
        let err = DocTidyError::config("max_tags must be at least 1");
        assert_eq!(err.to_string(), "config error: max_tags must be at least 1");

        let err = DocTidyError::parse("binary content in assets/logo.md");
        assert!(err.to_string().starts_with("parse error:"));
        assert!(err.to_string().contains("assets/logo.md"));
    }

    #[test]
    fn io_error_carries_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = DocTidyError::io("/tmp/raw/page.md", source);
        let msg = err.to_string();
        assert!(msg.contains("/tmp/raw/page.md"));
        assert!(msg.contains("gone"));
    }
}
