//! # tidvakt-config
//!
//! Hierarchical configuration for the tidvakt virtual-time toolkit.
//!
//! ## Features
//! - **Unified Configuration**: one container covering the clock and the
//!   scenario harness
//! - **Validation**: runtime validation of critical parameters
//! - **Environment Awareness**: `TIDVAKT_*` environment variables override
//!   file-based settings

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

mod error;

pub use error::ConfigError;

/// Auto-advance amounts beyond this are rejected up front rather than at
/// clock construction time. Matches the scheduler's supported bound
/// (`u32::MAX` seconds, in nanoseconds).
const MAX_AUTO_ADVANCE_NS: u64 = u32::MAX as u64 * 1_000_000_000;

/// Top-level configuration container.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct TidvaktConfig {
    /// Virtual clock parameters used when a scenario does not carry its own.
    #[validate(nested)]
    #[serde(default)]
    pub clock: ClockConfig,

    /// Scenario harness parameters.
    #[validate(nested)]
    #[serde(default)]
    pub harness: HarnessConfig,
}

/// Starting state of a virtual clock.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq, Eq)]
pub struct ClockConfig {
    /// Initial virtual time in nanoseconds.
    #[serde(default)]
    pub start_ns: u64,

    /// Amount added to the clock on every read, in nanoseconds. Zero
    /// disables auto-advance.
    #[serde(default)]
    #[validate(custom(function = validate_auto_advance))]
    pub auto_advance_ns: u64,

    /// Opaque local time zone identifier, stored pass-through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_time_zone: Option<String>,
}

/// Parameters for generated scenarios and replay runs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HarnessConfig {
    /// Seed for the random scenario generator.
    pub seed: u64,

    /// Number of steps in a generated scenario.
    #[validate(range(min = 1, max = 1_000_000))]
    pub step_count: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            step_count: 100,
        }
    }
}

fn validate_auto_advance(value: u64) -> Result<(), ValidationError> {
    if value > MAX_AUTO_ADVANCE_NS {
        return Err(ValidationError::new("auto_advance_too_large"));
    }
    Ok(())
}

impl TidvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/tidvakt.yaml`, if present
    /// 3. `config/<environment>.yaml` selected by `TIDVAKT_ENV`
    /// 4. `TIDVAKT_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(TidvaktConfig::default()));

        if Path::new("config/tidvakt.yaml").exists() {
            figment = figment.merge(Yaml::file("config/tidvakt.yaml"));
        }

        if let Ok(env) = std::env::var("TIDVAKT_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        figment
            .merge(Env::prefixed("TIDVAKT_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Load configuration from a specific path, for tests and the CLI's
    /// `--config` flag.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Figment::from(Serialized::defaults(TidvaktConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TIDVAKT_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
