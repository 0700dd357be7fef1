//! Request handling boundary.
//!
//! # Data Flow
//! ```text
//! Connection (TCP, or stdin/stdout for inetd/CGI)
//!     → handler.rs (RequestHandler trait, HandlerContext)
//!     → [cache backend: hit/miss/expiry, upstream fetch]
//!     → LogChannel access record (HIT / MISS / EXPIRED)
//!
//! Without a cache backend:
//!     → unavailable.rs (request.rs reads the head, answers 503)
//! ```
//!
//! # Design Decisions
//! - The supervisory core never looks inside a request
//! - A handler runs inside exactly one worker and may fail or panic there
//! - Handlers get configuration snapshots, not the mutable store

pub mod handler;
pub mod request;
pub mod unavailable;

pub use handler::{is_broken_pipe, CacheStatus, HandlerContext, HandlerError, RequestHandler};
pub use unavailable::UnavailableHandler;
