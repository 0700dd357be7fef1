//! The boundary between the supervisory core and the cache logic.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::config::{Config, ConfigStore, PathMap};
use crate::lifecycle::Mode;
use crate::net::Connection;
use crate::observability::LogChannel;

/// Anything a handler may fail with. Contained to the worker that ran it.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a request as recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler gets to see of the daemon.
///
/// Deliberately has no route to the worker registry: a worker can neither
/// track nor terminate its siblings.
#[derive(Clone)]
pub struct HandlerContext {
    mode: Mode,
    client: Option<IpAddr>,
    config: Arc<ConfigStore>,
    logs: Arc<LogChannel>,
}

impl HandlerContext {
    pub fn new(
        mode: Mode,
        client: Option<IpAddr>,
        config: Arc<ConfigStore>,
        logs: Arc<LogChannel>,
    ) -> Self {
        Self {
            mode,
            client,
            config,
            logs,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn client(&self) -> Option<IpAddr> {
        self.client
    }

    /// Current configuration snapshot. May change between two calls if a
    /// reload lands in between.
    pub fn config(&self) -> Arc<Config> {
        self.config.snapshot()
    }

    pub fn path_map(&self) -> Arc<PathMap> {
        self.config.path_map()
    }

    pub fn logs(&self) -> &LogChannel {
        &self.logs
    }
}

/// Performs the cache/proxy work for one connection.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, conn: Connection, ctx: HandlerContext) -> BoxFuture<'_, Result<(), HandlerError>>;
}

/// True when `err` is a client hanging up mid-write.
pub fn is_broken_pipe(err: &HandlerError) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|e| {
            matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
            )
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_status_renders_log_tokens() {
        assert_eq!(CacheStatus::Hit.to_string(), "HIT");
        assert_eq!(CacheStatus::Miss.to_string(), "MISS");
        assert_eq!(CacheStatus::Expired.to_string(), "EXPIRED");
    }

    #[test]
    fn broken_pipe_is_recognised() {
        let err: HandlerError = Box::new(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(is_broken_pipe(&err));
        let err: HandlerError = "upstream failed".into();
        assert!(!is_broken_pipe(&err));
    }
}
