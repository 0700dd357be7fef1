//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured daemon_addr list (or all interfaces)
//!     → listener.rs (bind with retry/backoff, IPv6 first)
//!     → Endpoint per address; the last one may stay in the supervisor
//!     → accept → connection.rs (Connection::Tcp)
//!
//! inetd / CGI:
//!     stdin/stdout → connection.rs (Connection::Stdio)
//! ```
//!
//! # Design Decisions
//! - Every endpoint must be bound before any accept loop starts
//! - Bind retry uses a fixed backoff, not exponential
//! - Handlers only ever see a Connection, never a listener

pub mod connection;
pub mod listener;

pub use connection::Connection;
pub use listener::{BindError, BindPolicy, Endpoint, ListenerSet};
