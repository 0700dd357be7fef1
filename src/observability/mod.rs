//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor, control plane, startup:
//!     → logging.rs (tracing events on stderr)
//!
//! Workers and request handler:
//!     → log_channel.rs
//!         → <logdir>/access.log  time|pid|client|status|size|filename
//!         → <logdir>/error.log   time|level [pid]: message
//! ```
//!
//! # Design Decisions
//! - One record per lock acquisition; the lock never spans two records
//! - Sinks are opened after privileges are dropped and shared, never
//!   reopened per worker
//! - A failed write reopens both sinks; the failed record goes to stderr

pub mod log_channel;
pub mod logging;

pub use log_channel::{Level, LogChannel, LogError};
pub use logging::init_tracing;
