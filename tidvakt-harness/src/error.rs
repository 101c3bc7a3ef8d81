//! Error types for scenario replay.

use thiserror::Error;

use tidvakt_core::ClockError;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Scenario file could not be read.
    #[error("scenario I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario file is not valid YAML for the scenario schema.
    #[error("scenario parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A clock or timer operation in the scenario failed.
    #[error("clock operation failed: {0}")]
    Clock(#[from] ClockError),

    /// A step referenced a timer label that was never created or was
    /// already disposed.
    #[error("unknown timer label: {0}")]
    UnknownTimer(String),

    /// Two `create_timer` steps used the same label.
    #[error("duplicate timer label: {0}")]
    DuplicateTimer(String),
}
