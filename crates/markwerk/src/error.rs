//! Error types for markwerk.
//!
//! Every fallible operation returns [`MarkwerkError`]. The enum keeps the usual split
//! between system errors and application errors, and adds the two terminal outcomes of
//! a dispatch run:
//!
//! - `UnsupportedFormat` - no registered converter accepted any candidate descriptor
//! - `ConversionFailed` - at least one converter accepted, but every `convert` call failed
//!
//! **System errors bubble up unchanged.** `MarkwerkError::Io` is returned as soon as a
//! source cannot be opened, read or rewound; it is never folded into an attempt record.
//!
//! **Converter errors are recorded, not interpreted.** Whatever a converter returns from
//! `convert` ends up as an [`AttemptRecord`] and dispatch moves on to the next converter.
//!
//! # Example
//!
//! ```rust
//! use markwerk::{MarkwerkError, Result};
//!
//! fn read_note(path: &str) -> Result<String> {
//!     let content = std::fs::read_to_string(path)?;
//!     if content.is_empty() {
//!         return Err(MarkwerkError::validation(format!("Note is empty: {}", path)));
//!     }
//!     Ok(content)
//! }
//! ```
use crate::types::StreamDescriptor;
use serde::Serialize;
use std::fmt::Write as _;
use thiserror::Error;

/// Result type alias using `MarkwerkError`.
pub type Result<T> = std::result::Result<T, MarkwerkError>;

/// Main error type for all markwerk operations.
#[derive(Debug, Error)]
pub enum MarkwerkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// No converter accepted any candidate; `descriptor` is the best guess (first candidate).
    #[error("Unsupported format: no converter accepted {descriptor}")]
    UnsupportedFormat { descriptor: Box<StreamDescriptor> },

    /// Some converter accepted the stream but every conversion attempt failed.
    #[error("{}", describe_attempts(.attempts))]
    ConversionFailed { attempts: Vec<AttemptRecord> },

    #[error("{0}")]
    Other(String),
}

/// Diagnostic entry for one failed `convert` call.
///
/// Records are kept in the order the attempts were made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// Name of the converter that failed.
    pub converter: String,
    /// Candidate descriptor the converter was invoked with.
    pub descriptor: StreamDescriptor,
    /// Stable error kind label, see [`MarkwerkError::kind`].
    pub error_kind: String,
    /// Rendered error message.
    pub error_message: String,
}

impl AttemptRecord {
    pub fn new(converter: impl Into<String>, descriptor: StreamDescriptor, error: &MarkwerkError) -> Self {
        Self {
            converter: converter.into(),
            descriptor,
            error_kind: error.kind().to_string(),
            error_message: error.to_string(),
        }
    }
}

fn describe_attempts(attempts: &[AttemptRecord]) -> String {
    let mut message = format!("Conversion failed after {} attempt(s):", attempts.len());
    for attempt in attempts {
        let _ = write!(
            message,
            "\n - {} ({}) failed with {}: {}",
            attempt.converter, attempt.descriptor, attempt.error_kind, attempt.error_message
        );
    }
    message
}

impl From<serde_json::Error> for MarkwerkError {
    fn from(err: serde_json::Error) -> Self {
        MarkwerkError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "archives")]
impl From<zip::result::ZipError> for MarkwerkError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => MarkwerkError::Io(io_err),
            other => MarkwerkError::Parsing {
                message: format!("Invalid ZIP archive: {}", other),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(feature = "tabular")]
impl From<csv::Error> for MarkwerkError {
    fn from(err: csv::Error) -> Self {
        MarkwerkError::Parsing {
            message: format!("Invalid CSV: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl MarkwerkError {
    error_constructor!(parsing, Parsing);
    error_constructor!(validation, Validation);

    /// Stable, lowercase label for the error variant.
    ///
    /// Used as the `error_kind` of attempt records so callers can tell a wrong format
    /// guess (`parsing`) from an environment problem (`missing_dependency`, `io`).
    pub fn kind(&self) -> &'static str {
        match self {
            MarkwerkError::Io(_) => "io",
            MarkwerkError::Parsing { .. } => "parsing",
            MarkwerkError::Validation { .. } => "validation",
            MarkwerkError::Serialization { .. } => "serialization",
            MarkwerkError::MissingDependency(_) => "missing_dependency",
            MarkwerkError::Plugin { .. } => "plugin",
            MarkwerkError::LockPoisoned(_) => "lock_poisoned",
            MarkwerkError::UnsupportedFormat { .. } => "unsupported_format",
            MarkwerkError::ConversionFailed { .. } => "conversion_failed",
            MarkwerkError::Other(_) => "other",
        }
    }

    /// Attempt records carried by a `ConversionFailed` error, empty otherwise.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            MarkwerkError::ConversionFailed { attempts } => attempts,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MarkwerkError = io_err.into();
        assert!(matches!(err, MarkwerkError::Io(_)));
        assert!(err.to_string().contains("IO error"));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_parsing_error() {
        let err = MarkwerkError::parsing("invalid format");
        assert_eq!(err.to_string(), "Parsing error: invalid format");
        assert_eq!(err.kind(), "parsing");
    }

    #[test]
    fn test_parsing_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad data");
        let err = MarkwerkError::parsing_with_source("invalid format", source);
        assert_eq!(err.to_string(), "Parsing error: invalid format");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_error() {
        let err = MarkwerkError::validation("invalid input");
        assert_eq!(err.to_string(), "Validation error: invalid input");
    }

    #[test]
    fn test_unsupported_format_names_descriptor() {
        let descriptor = StreamDescriptor::new().with_extension(".xyz");
        let err = MarkwerkError::UnsupportedFormat {
            descriptor: Box::new(descriptor),
        };
        let message = err.to_string();
        assert!(message.starts_with("Unsupported format"));
        assert!(message.contains(".xyz"));
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[test]
    fn test_conversion_failed_lists_attempts_in_order() {
        let descriptor = StreamDescriptor::new().with_mime_type("text/csv");
        let attempts = vec![
            AttemptRecord::new("first", descriptor.clone(), &MarkwerkError::parsing("bad row")),
            AttemptRecord::new(
                "second",
                descriptor,
                &MarkwerkError::MissingDependency("csv support".to_string()),
            ),
        ];
        let err = MarkwerkError::ConversionFailed { attempts };
        let message = err.to_string();

        assert!(message.starts_with("Conversion failed after 2 attempt(s):"));
        let first = message.find("first").unwrap();
        let second = message.find("second").unwrap();
        assert!(first < second);
        assert!(message.contains("missing_dependency"));
        assert_eq!(err.attempts().len(), 2);
    }

    #[test]
    fn test_attempts_empty_for_other_variants() {
        assert!(MarkwerkError::Other("x".to_string()).attempts().is_empty());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: MarkwerkError = json_err.into();
        assert!(matches!(err, MarkwerkError::Serialization { .. }));
    }

    #[test]
    fn test_plugin_error() {
        let err = MarkwerkError::Plugin {
            message: "registration failed".to_string(),
            plugin_name: "rtf-plugin".to_string(),
        };
        assert_eq!(err.to_string(), "Plugin error in 'rtf-plugin': registration failed");
    }

    #[test]
    fn test_lock_poisoned_error() {
        let err = MarkwerkError::LockPoisoned("Registry lock poisoned".to_string());
        assert_eq!(err.to_string(), "Lock poisoned: Registry lock poisoned");
    }

    #[test]
    fn test_io_error_bubbles_unchanged() {
        fn read_file() -> Result<String> {
            let content = std::fs::read_to_string("/nonexistent/file.txt")?;
            Ok(content)
        }

        assert!(matches!(read_file().unwrap_err(), MarkwerkError::Io(_)));
    }
}
