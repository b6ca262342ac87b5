//! Error types for Pluqqy.
//!
//! Library crates use [`PluqqyError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Pluqqy operations.
#[derive(Debug, thiserror::Error)]
pub enum PluqqyError {
    /// Settings loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML front-matter or pipeline file could not be parsed or written.
    #[error("yaml error in {path:?}: {message}")]
    Yaml { path: PathBuf, message: String },

    /// User input failed validation (empty name, duplicate name, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A component, pipeline, or tag does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The composer could not render a pipeline.
    #[error("compose error: {0}")]
    Compose(String),

    /// The external editor is unset, rejected, or failed.
    #[error("editor error: {0}")]
    Editor(String),

    /// System clipboard access failed.
    #[error("clipboard error: {0}")]
    Clipboard(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PluqqyError>;

impl PluqqyError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Wrap a YAML (de)serialization failure with the offending path.
    pub fn yaml(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Yaml {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PluqqyError::config("sections list is empty");
        assert_eq!(err.to_string(), "config error: sections list is empty");

        let err = PluqqyError::validation("name must not be empty");
        assert!(err.to_string().contains("must not be empty"));

        let err = PluqqyError::NotFound("components/prompts/x.md".into());
        assert_eq!(err.to_string(), "not found: components/prompts/x.md");
    }
}
