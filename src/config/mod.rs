//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → loader.rs (file grammar: key = value, or flat TOML)
//!     → -R / -p / -r options → PKG_CACHER_* env (CGI) → key=value tokens
//!     → validation.rs (semantic checks)
//!     → store.rs (ConfigStore, shared via Arc to all subsystems)
//!
//! On reload signal:
//!     loader.rs re-reads the original file
//!     → only RELOADABLE_KEYS are copied into the live snapshot
//!     → path_map.rs rebuilds the PathMap from scratch
//!     → atomic swap; in-flight workers see old or new values
//! ```
//!
//! # Design Decisions
//! - Configuration is a flat string map; the file grammar is pluggable
//! - Privilege-sensitive keys are frozen after startup
//! - Command-line overrides are kept and re-applied on every reload

pub mod loader;
pub mod path_map;
pub mod schema;
pub mod store;
pub mod validation;

pub use loader::{ConfigError, ConfigLoader, Overrides};
pub use path_map::PathMap;
pub use schema::{Config, DEFAULT_CONFIG_PATH, RELOADABLE_KEYS};
pub use store::ConfigStore;
