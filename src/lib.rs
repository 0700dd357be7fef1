//! pkg-cacher daemon core.
//!
//! Listener management, per-connection worker isolation, signal-driven
//! control, configuration layering and cross-process safe logging for a
//! package caching proxy. The cache logic itself plugs in through
//! [`http::RequestHandler`].

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod supervisor;

pub use config::ConfigStore;
pub use context::DaemonContext;
pub use error::DaemonError;
pub use lifecycle::{Mode, ModeDispatcher, Shutdown};
