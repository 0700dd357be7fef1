//! Append-only access and error logs shared by every worker.
//!
//! Each record goes out in a single `write_all` while the sink holds both an
//! in-process mutex and an exclusive `flock` on the file, so records from
//! concurrent workers, and from other daemon processes appending to the same
//! file, never interleave.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use parking_lot::Mutex;

use crate::config::ConfigStore;
use crate::http::CacheStatus;

pub const ACCESS_LOG: &str = "access.log";
pub const ERROR_LOG: &str = "error.log";

const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write to {sink} log failed: {source}")]
    Write {
        sink: &'static str,
        source: std::io::Error,
    },
    #[error("cannot lock {sink} log: {source}")]
    Lock { sink: &'static str, source: Errno },
}

/// Severity written into the error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
        })
    }
}

/// One append-mode log file.
struct LogSink {
    name: &'static str,
    file: Mutex<Option<File>>,
}

impl LogSink {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            file: Mutex::new(None),
        }
    }

    fn open(&self, path: &Path) -> Result<(), LogError> {
        let mut slot = self.file.lock();
        if slot.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        *slot = Some(file);
        Ok(())
    }

    fn close(&self) {
        self.file.lock().take();
    }

    fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Append one record. Returns `Ok(false)` when the sink is not open.
    fn append(&self, record: &str) -> Result<bool, LogError> {
        let slot = self.file.lock();
        let Some(file) = slot.as_ref() else {
            return Ok(false);
        };

        let handle = file.try_clone().map_err(|source| LogError::Write {
            sink: self.name,
            source,
        })?;
        let mut locked = Flock::lock(handle, FlockArg::LockExclusive).map_err(|(_, errno)| {
            LogError::Lock {
                sink: self.name,
                source: errno,
            }
        })?;
        locked
            .write_all(record.as_bytes())
            .map_err(|source| LogError::Write {
                sink: self.name,
                source,
            })?;
        Ok(true)
    }
}

/// The daemon's access and error logs.
pub struct LogChannel {
    config: Arc<ConfigStore>,
    dir: Mutex<Option<PathBuf>>,
    access: LogSink,
    error: LogSink,
}

impl LogChannel {
    /// A channel with both sinks closed. Until [`LogChannel::open`] succeeds,
    /// error records go to standard error.
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            dir: Mutex::new(None),
            access: LogSink::new("access"),
            error: LogSink::new("error"),
        }
    }

    /// Open both sinks under `log_dir`. Sinks that are already open are kept.
    pub fn open(&self, log_dir: &Path) -> Result<(), LogError> {
        *self.dir.lock() = Some(log_dir.to_path_buf());
        self.access.open(&log_dir.join(ACCESS_LOG))?;
        self.error.open(&log_dir.join(ERROR_LOG))?;
        tracing::debug!(dir = %log_dir.display(), "Log sinks open");
        Ok(())
    }

    /// Close and reopen both sinks in the last directory passed to `open`.
    pub fn reopen(&self) -> Result<(), LogError> {
        let Some(dir) = self.dir.lock().clone() else {
            return Ok(());
        };
        self.access.close();
        self.error.close();
        self.open(&dir)
    }

    pub fn is_open(&self) -> bool {
        self.access.is_open() && self.error.is_open()
    }

    /// Append `time|pid|client|status|size|filename` to the access log.
    pub fn write_access(
        &self,
        status: CacheStatus,
        filename: &str,
        size: u64,
        client: Option<IpAddr>,
    ) -> Result<(), LogError> {
        let client = client.map_or_else(|| "-".to_string(), |ip| ip.to_string());
        let record = format!(
            "{}|{}|{}|{}|{}|{}\n",
            timestamp(),
            std::process::id(),
            client,
            status,
            size,
            filename
        );
        match self.access.append(&record) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.recover(&e);
                Err(e)
            }
        }
    }

    pub fn write_error(&self, message: &str) -> Result<(), LogError> {
        self.log(Level::Error, message)
    }

    /// Append only while the live configuration has `debug` set.
    pub fn debug(&self, message: &str) -> Result<(), LogError> {
        if !self.config.debug_enabled() {
            return Ok(());
        }
        self.log(Level::Debug, message)
    }

    /// Append `time|level [pid]: message` to the error log.
    ///
    /// Falls back to standard error when the sink is not open yet. A failed
    /// write reopens both sinks, echoes the record to standard error and
    /// returns the original failure.
    pub fn log(&self, level: Level, message: &str) -> Result<(), LogError> {
        let record = format!("{}|{} [{}]: {}\n", timestamp(), level, std::process::id(), message);
        match self.error.append(&record) {
            Ok(true) => Ok(()),
            Ok(false) => {
                eprint!("{record}");
                Ok(())
            }
            Err(e) => {
                eprint!("{record}");
                self.recover(&e);
                Err(e)
            }
        }
    }

    fn recover(&self, cause: &LogError) {
        tracing::warn!(error = %cause, "Log write failed, reopening sinks");
        if let Err(e) = self.reopen() {
            tracing::error!(error = %e, "Reopening log sinks failed");
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;

    fn channel(debug: bool) -> LogChannel {
        let mut config = Config::with_defaults();
        config.set("debug", if debug { "1" } else { "0" });
        LogChannel::new(Arc::new(ConfigStore::from_config(config, "/dev/null")))
    }

    #[test]
    fn access_records_are_pipe_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let logs = channel(false);
        logs.open(dir.path()).unwrap();
        logs.write_access(
            CacheStatus::Hit,
            "debian/pool/main/h/hello.deb",
            1234,
            Some("10.0.0.7".parse().unwrap()),
        )
        .unwrap();

        let content = fs::read_to_string(dir.path().join(ACCESS_LOG)).unwrap();
        let fields: Vec<&str> = content.trim_end().split('|').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[1], std::process::id().to_string());
        assert_eq!(&fields[2..], &["10.0.0.7", "HIT", "1234", "debian/pool/main/h/hello.deb"]);
    }

    #[test]
    fn error_records_carry_level_and_pid() {
        let dir = tempfile::tempdir().unwrap();
        let logs = channel(false);
        logs.open(dir.path()).unwrap();
        logs.write_error("upstream unreachable").unwrap();

        let content = fs::read_to_string(dir.path().join(ERROR_LOG)).unwrap();
        let expected = format!("|error [{}]: upstream unreachable\n", std::process::id());
        assert!(content.ends_with(&expected), "{content:?}");
    }

    #[test]
    fn debug_follows_live_flag() {
        let dir = tempfile::tempdir().unwrap();
        let logs = channel(false);
        logs.open(dir.path()).unwrap();

        logs.debug("hidden").unwrap();
        logs.config.toggle_debug();
        logs.debug("shown").unwrap();

        let content = fs::read_to_string(dir.path().join(ERROR_LOG)).unwrap();
        assert!(!content.contains("hidden"));
        assert!(content.contains("|debug ["));
        assert!(content.contains("shown"));
    }

    #[test]
    fn unopened_channel_falls_back_quietly() {
        let logs = channel(true);
        assert!(!logs.is_open());
        assert!(logs.write_error("startup failed").is_ok());
        assert!(logs.write_access(CacheStatus::Miss, "x", 0, None).is_ok());
    }

    #[test]
    fn open_is_idempotent_and_reopen_keeps_appending() {
        let dir = tempfile::tempdir().unwrap();
        let logs = channel(false);
        logs.open(dir.path()).unwrap();
        logs.write_error("first").unwrap();
        logs.open(dir.path()).unwrap();
        logs.reopen().unwrap();
        logs.write_error("second").unwrap();

        let content = fs::read_to_string(dir.path().join(ERROR_LOG)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
