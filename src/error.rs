//! Top-level daemon error.

use crate::config::ConfigError;
use crate::lifecycle::startup::StartupError;
use crate::net::BindError;
use crate::observability::LogError;
use crate::supervisor::SupervisorError;

/// Any failure that ends the daemon. Worker failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
