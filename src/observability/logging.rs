//! Structured diagnostics for the daemon itself.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber once per process
//! - Pick the default filter from the configured `debug` flag
//!
//! # Design Decisions
//! - Diagnostics go to stderr; the persistent access/error records are the
//!   LogChannel's job
//! - `RUST_LOG` always wins over the configured default

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for the given debug setting.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "pkg_cacher=debug"
    } else {
        "pkg_cacher=info"
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_tracing(debug: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
