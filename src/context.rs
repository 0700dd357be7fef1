//! The daemon context shared by every component.

use std::net::IpAddr;
use std::sync::Arc;

use crate::config::{Config, ConfigStore};
use crate::http::HandlerContext;
use crate::lifecycle::{Mode, Shutdown};
use crate::observability::LogChannel;

/// Configuration, log sinks and shutdown state of one daemon process.
///
/// Built once at startup and cloned into every task that needs it; nothing
/// in the crate reaches this state through globals.
#[derive(Clone)]
pub struct DaemonContext {
    mode: Mode,
    config: Arc<ConfigStore>,
    logs: Arc<LogChannel>,
    shutdown: Shutdown,
}

impl DaemonContext {
    /// A context whose log channel is not yet open.
    pub fn new(mode: Mode, config: Arc<ConfigStore>) -> Self {
        let logs = Arc::new(LogChannel::new(Arc::clone(&config)));
        Self {
            mode,
            config,
            logs,
            shutdown: Shutdown::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config_store(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.config)
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.snapshot()
    }

    pub fn logs(&self) -> &Arc<LogChannel> {
        &self.logs
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// The view of this context handed to a request handler.
    pub fn handler_context(&self, client: Option<IpAddr>) -> HandlerContext {
        HandlerContext::new(
            self.mode,
            client,
            Arc::clone(&self.config),
            Arc::clone(&self.logs),
        )
    }
}
