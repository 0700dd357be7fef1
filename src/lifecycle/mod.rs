//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs, mode.rs):
//!     cache_dir check → instance lock → [daemonize] → bind
//!     → pidfile → chroot/setuid → open logs → serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ControlEvent::Terminate
//!     SIGHUP         → ControlEvent::Reload
//!     SIGUSR1        → ControlEvent::ToggleDebug
//!
//! Control (control.rs):
//!     ControlEvent → apply between accept iterations
//!
//! Shutdown (shutdown.rs):
//!     terminating flag → accept loops return → workers terminated → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: privileges are dropped only after every bind
//! - Signal listeners never mutate state; they only enqueue events
//! - The terminating flag is polled, never preemptive

pub mod control;
pub mod mode;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use control::{ControlFlow, ControlPlane};
pub use mode::{cgi_gone_response, run_listeners, serve, Mode, ModeDispatcher};
pub use shutdown::Shutdown;
pub use signals::ControlEvent;
pub use startup::StartupError;
