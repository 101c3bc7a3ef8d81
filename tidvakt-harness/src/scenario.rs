//! Scenario description for deterministic replay.
//!
//! A scenario is a starting clock state plus an ordered list of clock and
//! timer operations. Scenarios are stored as YAML so failing runs can be
//! committed as regression fixtures.

use std::path::Path;

use serde::{Deserialize, Serialize};

use tidvakt_config::ClockConfig;

use crate::error::HarnessError;

/// A recorded or generated sequence of clock and timer operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Clock parameters for this scenario; when absent, the replay falls
    /// back to the surrounding configuration's clock section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockConfig>,
    pub steps: Vec<ScenarioStep>,
}

/// One operation against the clock or a timer, identified by `op`.
/// Timers are referred to by label so steps can target them later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Register a timer. `due_ms`/`period_ms` absent means "never"/"one-shot".
    CreateTimer {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period_ms: Option<u64>,
    },
    /// Move virtual time forward by `ms`.
    Advance { ms: u64 },
    /// Jump virtual time to an absolute instant.
    SetNow { ns: u64 },
    /// Rearm a timer relative to the current time.
    Change {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period_ms: Option<u64>,
    },
    /// Dispose a timer; it never fires again.
    Dispose { label: String },
    /// Read the clock. Meaningful when auto-advance is configured, since
    /// the read itself moves time.
    ReadClock,
}

impl Scenario {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, HarnessError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn to_yaml(&self) -> Result<String, HarnessError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), HarnessError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}
