//! Seeded random scenario generation.
//!
//! Produces reproducible scenarios for fuzz-style regression hunting: the
//! same seed always yields byte-identical YAML, so a failing seed is a
//! complete bug report.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::scenario::{Scenario, ScenarioStep};

/// Builds a random but reproducible scenario of `step_count` steps.
///
/// Generated scenarios always start by creating at least one timer, and
/// only ever change or dispose labels that are still live, so they replay
/// without errors.
pub fn generate(seed: u64, step_count: usize) -> Scenario {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut steps = Vec::with_capacity(step_count);
    let mut live: Vec<String> = Vec::new();
    let mut next_label = 0usize;
    // Virtual time elapsed so far, so set_now jumps stay monotonic.
    let mut now_ms = 0u64;

    for i in 0..step_count {
        // Force an initial create so advances have something to wake.
        let roll = if i == 0 { 0 } else { rng.random_range(0..100u32) };
        match roll {
            0..=29 => {
                let label = format!("t{}", next_label);
                next_label += 1;
                let due_ms = if rng.random_bool(0.1) {
                    None
                } else {
                    Some(rng.random_range(0..=1500))
                };
                let period_ms = if rng.random_bool(0.5) {
                    Some(rng.random_range(100..=1000))
                } else {
                    None
                };
                live.push(label.clone());
                steps.push(ScenarioStep::CreateTimer {
                    label,
                    due_ms,
                    period_ms,
                });
            }
            30..=64 => {
                let ms = rng.random_range(1..=2000);
                now_ms += ms;
                steps.push(ScenarioStep::Advance { ms });
            }
            65..=69 => {
                now_ms += rng.random_range(1..=2000);
                steps.push(ScenarioStep::SetNow {
                    ns: now_ms * 1_000_000,
                });
            }
            70..=84 if !live.is_empty() => {
                let label = live[rng.random_range(0..live.len())].clone();
                let due_ms = Some(rng.random_range(0..=1500));
                let period_ms = if rng.random_bool(0.5) {
                    Some(rng.random_range(100..=1000))
                } else {
                    None
                };
                steps.push(ScenarioStep::Change {
                    label,
                    due_ms,
                    period_ms,
                });
            }
            85..=94 if !live.is_empty() => {
                let label = live.swap_remove(rng.random_range(0..live.len()));
                steps.push(ScenarioStep::Dispose { label });
            }
            _ => steps.push(ScenarioStep::ReadClock),
        }
    }

    Scenario {
        name: format!("generated-{}", seed),
        clock: None,
        steps,
    }
}
