//! Subscriber setup for the `medsync` binary.
//!
//! Everything is written to stderr. Stdout carries command results only, so
//! `medsync diff --json` can be piped straight into another tool.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins when set and parseable; otherwise `fallback` applies.
fn filter_for(fallback: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback.as_str()))
}

/// Install the process subscriber, as JSON lines when `json` is set.
///
/// A second call is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter_for(level));
    let installed = if json {
        registry.with(base.json()).try_init()
    } else {
        registry.with(base).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
