//! Worker supervision subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint (supervisor or listener worker)
//!     → accept.rs (accept, check terminating flag)
//!     → worker.rs (spawn isolated worker, record it, keep accepting)
//!         → RequestHandler (panics and errors contained here)
//!         → worker exits → registry.rs record removed (reaped)
//!
//! Shutdown:
//!     terminating flag set → accept loops return
//!     → registry.rs terminate_all (abort every tracked worker)
//! ```
//!
//! # Design Decisions
//! - One tokio task per worker; a handler panic ends only that task
//! - The supervisor never awaits a worker
//! - Each listener worker owns a fresh, empty registry; nobody can reach
//!   a sibling's workers
//! - Dropping a supervisor terminates whatever it still tracks

pub mod accept;
pub mod registry;
pub mod worker;

pub use registry::{WorkerId, WorkerKind, WorkerRecord, WorkerRegistry};
pub use worker::{Supervisor, SupervisorError};
