//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;
use validator::ValidationErrors;

/// Unified configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Requested configuration file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// One or more fields failed validation.
    #[error("invalid configuration:\n{}", render_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    /// Figment parsing or merging error.
    #[error("configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),

    /// I/O error while reading configuration.
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

fn render_validation_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.code.to_string());
            let _ = writeln!(out, "  {}: {}", field, message);
        }
    }
    out
}
