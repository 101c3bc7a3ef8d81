/*!
# tidvakt-harness

Deterministic scenario runner for the tidvakt virtual clock.

A scenario drives a fresh `VirtualClock` through a scripted sequence of
clock and timer operations while every fired callback is recorded into a
trace. The trace is folded into a BLAKE3 hash, so two runs of the same
scenario can be compared with a single string — the backbone of replay
debugging and fuzz-style regression hunting.

## Key Components:
- **Scenario:** serde-described operation script, stored as YAML.
- **Replay Engine:** executes a scenario and produces a `ReplayReport`.
- **Generator:** builds reproducible random scenarios from a `u64` seed.
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use blake3::Hasher;
use parking_lot::Mutex;
use tracing::{debug, info};

use tidvakt_config::ClockConfig;
use tidvakt_core::{TimerHandle, VirtualClock};

mod error;
pub mod generate;
pub mod scenario;

pub use error::HarnessError;
pub use scenario::{Scenario, ScenarioStep};

/// One observed timer fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireEvent {
    pub label: String,
    pub at_ns: u64,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    /// BLAKE3 hex digest of the fire trace and final clock state.
    pub state_hash: String,
    pub fires: Vec<FireEvent>,
    pub final_now_ns: u64,
}

/// Executes scenarios against a virtual clock.
pub struct Replay {
    clock: VirtualClock,
    handles: HashMap<String, TimerHandle>,
    trace: Arc<Mutex<Vec<FireEvent>>>,
}

impl Replay {
    /// Builds a replay engine from clock parameters.
    pub fn new(clock_config: &ClockConfig) -> Result<Self, HarnessError> {
        let clock = VirtualClock::new(clock_config.start_ns);
        clock.set_auto_advance(Duration::from_nanos(clock_config.auto_advance_ns))?;
        if let Some(zone) = &clock_config.local_time_zone {
            clock.set_local_time_zone(zone.clone());
        }
        Ok(Self {
            clock,
            handles: HashMap::new(),
            trace: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Runs every step of `scenario` in order and reports the fire trace.
    pub fn run(mut self, scenario: &Scenario) -> Result<ReplayReport, HarnessError> {
        info!(name = %scenario.name, steps = scenario.steps.len(), "replaying scenario");
        for step in &scenario.steps {
            self.apply(step)?;
        }

        // Dispose leftovers explicitly so the report reflects a quiesced
        // clock regardless of scenario hygiene.
        self.handles.clear();

        let fires = Arc::try_unwrap(self.trace)
            .map(Mutex::into_inner)
            .unwrap_or_else(|trace| trace.lock().clone());
        let final_now_ns = self.clock.now_ns();

        let mut hasher = Hasher::new();
        for fire in &fires {
            hasher.update(fire.label.as_bytes());
            hasher.update(&fire.at_ns.to_le_bytes());
        }
        hasher.update(&final_now_ns.to_le_bytes());
        let state_hash = hex::encode(hasher.finalize().as_bytes());

        info!(fires = fires.len(), %state_hash, "scenario complete");
        Ok(ReplayReport {
            state_hash,
            fires,
            final_now_ns,
        })
    }

    fn apply(&mut self, step: &ScenarioStep) -> Result<(), HarnessError> {
        debug!(?step, "applying step");
        match step {
            ScenarioStep::CreateTimer {
                label,
                due_ms,
                period_ms,
            } => {
                if self.handles.contains_key(label) {
                    return Err(HarnessError::DuplicateTimer(label.clone()));
                }
                let trace = Arc::clone(&self.trace);
                let cb_clock = self.clock.clone();
                let cb_label = label.clone();
                let handle = self.clock.create_timer(
                    move || {
                        trace.lock().push(FireEvent {
                            label: cb_label.clone(),
                            at_ns: cb_clock.now_ns(),
                        });
                    },
                    due_ms.map(Duration::from_millis),
                    period_ms.map(Duration::from_millis),
                )?;
                self.handles.insert(label.clone(), handle);
            }
            ScenarioStep::Advance { ms } => {
                self.clock.advance(Duration::from_millis(*ms))?;
            }
            ScenarioStep::SetNow { ns } => {
                self.clock.set_now_ns(*ns)?;
            }
            ScenarioStep::Change {
                label,
                due_ms,
                period_ms,
            } => {
                let handle = self
                    .handles
                    .get(label)
                    .ok_or_else(|| HarnessError::UnknownTimer(label.clone()))?;
                handle.change(
                    due_ms.map(Duration::from_millis),
                    period_ms.map(Duration::from_millis),
                )?;
            }
            ScenarioStep::Dispose { label } => {
                // Dropping the handle disposes it.
                self.handles
                    .remove(label)
                    .ok_or_else(|| HarnessError::UnknownTimer(label.clone()))?;
            }
            ScenarioStep::ReadClock => {
                let now = self.clock.now_ns();
                debug!(now_ns = now, "clock read");
            }
        }
        Ok(())
    }
}

/// Convenience wrapper: load a scenario file and replay it under the given
/// clock defaults (used when the scenario carries no clock section).
pub fn replay_file(
    path: impl AsRef<std::path::Path>,
    default_clock: &ClockConfig,
) -> Result<ReplayReport, HarnessError> {
    let scenario = Scenario::from_yaml_file(path)?;
    let clock_config = scenario.clock.clone().unwrap_or_else(|| default_clock.clone());
    Replay::new(&clock_config)?.run(&scenario)
}
