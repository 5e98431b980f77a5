//! Error types for curriculum imports.
//!
//! Library crates use [`CurriculumError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all parsing, validation and persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    /// A structural marker or buffer start references a scope that is not open.
    #[error("malformed document at line {line}: {reason}")]
    MalformedDocument { line: usize, reason: String },

    /// A field is missing or carries a value that cannot be used.
    #[error("validation error{}: {message}", line_suffix(.line))]
    Validation {
        line: Option<usize>,
        message: String,
    },

    /// A persistence adapter call failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CurriculumError>;

impl CurriculumError {
    /// Create a structural error for the given source line.
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            line,
            reason: reason.into(),
        }
    }

    /// Create a validation error, optionally tied to a source line.
    pub fn validation(line: Option<usize>, msg: impl Into<String>) -> Self {
        Self::Validation {
            line,
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Source line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedDocument { line, .. } => Some(*line),
            Self::Validation { line, .. } => *line,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CurriculumError::malformed(12, "Topic marker with no open Module");
        assert_eq!(
            err.to_string(),
            "malformed document at line 12: Topic marker with no open Module"
        );

        let err = CurriculumError::validation(Some(4), "course title is empty");
        assert_eq!(err.to_string(), "validation error at line 4: course title is empty");

        let err = CurriculumError::validation(None, "course title is empty");
        assert_eq!(err.to_string(), "validation error: course title is empty");
    }

    #[test]
    fn line_accessor() {
        assert_eq!(CurriculumError::malformed(3, "x").line(), Some(3));
        assert_eq!(CurriculumError::validation(None, "x").line(), None);
        assert_eq!(CurriculumError::Storage("x".into()).line(), None);
    }
}
