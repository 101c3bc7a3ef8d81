//! Structured logging setup for the CLI.
//!
//! `RUST_LOG` controls verbosity; the default is `info`. Scheduler
//! internals log at `trace` under the `tidvakt_core` target.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init()
}
