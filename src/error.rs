//! Error types for loading, coercing and saving file-backed models.

use std::io;
use std::path::PathBuf;

/// Error type for every fallible operation in the crate.
///
/// Parse failures, unreadable files and rejected field mappings are all
/// surfaced unchanged to the caller. Nothing is retried and nothing is
/// auto-corrected.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The file text does not follow the format's line structure.
    #[error("format error at line {line}: {reason}")]
    Format {
        /// 1-based physical line number in the source text (0 when the
        /// text ended before the expected line).
        line: usize,
        /// What was expected and what was found.
        reason: String,
    },

    /// The file could not be read.
    #[error("failed to load {}: {source}", path.display())]
    Load {
        /// Location that was being loaded.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Coercion rejected the field mapping.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A model refers back to a file that is already on its own ancestor
    /// chain.
    #[error("model graph cycle through {}", path.display())]
    Cycle {
        /// Location that was reached twice.
        path: PathBuf,
    },

    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Location that was being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A serializer was handed a value it has no text form for.
    #[error("cannot render field '{field}': {reason}")]
    Render {
        /// Key of the offending mapping entry.
        field: String,
        /// Description of the problem.
        reason: String,
    },

    /// The in-memory entity could not be flattened into a field mapping.
    #[error("failed to flatten model: {0}")]
    Flatten(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn format(line: usize, reason: impl Into<String>) -> Self {
        ModelError::Format {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn render(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::Render {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A field mapping was rejected during coercion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field '{field}': {kind}")]
pub struct ValidationError {
    /// Path of the offending field, e.g. `events[0].start_time`.
    pub field: String,
    /// Why the field was rejected.
    pub kind: ValidationErrorKind,
}

/// Category of a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationErrorKind {
    /// A required field is absent from the mapping.
    #[error("missing required field")]
    Missing,

    /// The value has the wrong shape for the field.
    #[error("expected {expected}")]
    TypeMismatch {
        /// Human-readable name of the expected type.
        expected: &'static str,
    },

    /// The value has the right shape but violates a constraint.
    #[error("{reason}")]
    Constraint {
        /// Description of the violated constraint.
        reason: String,
    },
}

impl ValidationError {
    /// A required field is absent.
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            kind: ValidationErrorKind::Missing,
        }
    }

    /// A field holds a value of the wrong shape.
    pub fn mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        ValidationError {
            field: field.into(),
            kind: ValidationErrorKind::TypeMismatch { expected },
        }
    }

    /// A field holds a value that breaks a constraint.
    pub fn constraint(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            kind: ValidationErrorKind::Constraint {
                reason: reason.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = ModelError::format(4, "expected 2 tokens, got 3");
        assert_eq!(
            err.to_string(),
            "format error at line 4: expected 2 tokens, got 3"
        );
    }

    #[test]
    fn display_load() {
        let err = ModelError::Load {
            path: PathBuf::from("/data/missing.bui"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.to_string(),
            "failed to load /data/missing.bui: no such file"
        );
    }

    #[test]
    fn display_cycle() {
        let err = ModelError::Cycle {
            path: PathBuf::from("/models/root.xml"),
        };
        assert_eq!(err.to_string(), "model graph cycle through /models/root.xml");
    }

    #[test]
    fn display_render() {
        let err = ModelError::render("station_names", "expected a list");
        assert_eq!(
            err.to_string(),
            "cannot render field 'station_names': expected a list"
        );
    }

    #[test]
    fn display_validation_kinds() {
        assert_eq!(
            ValidationError::missing("station_count").to_string(),
            "invalid field 'station_count': missing required field"
        );
        assert_eq!(
            ValidationError::mismatch("events", "list").to_string(),
            "invalid field 'events': expected list"
        );
        assert_eq!(
            ValidationError::constraint("events", "must not be empty").to_string(),
            "invalid field 'events': must not be empty"
        );
    }

    #[test]
    fn validation_passes_through_unchanged() {
        let inner = ValidationError::missing("event_count");
        let err: ModelError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
        assert!(matches!(err, ModelError::Validation(e) if e == inner));
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<ModelError>();
        assert_bounds::<ValidationError>();
    }
}
