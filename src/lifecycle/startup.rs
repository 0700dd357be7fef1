//! Process setup steps run before and around serving.
//!
//! # Responsibilities
//! - Verify required directories before anything binds
//! - Hold the instance lock under the cache directory
//! - Detach from the terminal (`-d`) before the runtime starts
//! - Write and remove the pidfile
//! - Confine (chroot) and drop privileges after listeners are bound
//!
//! # Design Decisions
//! - Fail fast: every error here is fatal to startup
//! - User and group names are resolved before chroot, while the password
//!   database is still reachable
//! - setgroups and setgid run before setuid; after setuid the process could
//!   no longer change its groups

use std::fs::{self, File, OpenOptions};
use std::io;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::RawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::socket::{getpeername, SockaddrLike, SockaddrStorage};
use nix::unistd::{self, Gid, Group, Uid, User};

use crate::config::Config;

/// Lock file guarding a cache directory against a second daemon.
pub const INSTANCE_LOCK: &str = "private/exlock";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("required directory {} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("{} is locked by another pkg-cacher instance", path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("cannot lock {}: {source}", path.display())]
    Lock { path: PathBuf, source: Errno },

    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("cannot detach from the terminal: {0}")]
    Daemonize(Errno),

    #[error("unknown user {0:?}")]
    UnknownUser(String),

    #[error("unknown group {0:?}")]
    UnknownGroup(String),

    #[error("{step} failed: {source}")]
    Privileges { step: &'static str, source: Errno },

    #[error("cannot start runtime: {0}")]
    Runtime(io::Error),
}

pub fn require_dir(path: &Path) -> Result<(), StartupError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(StartupError::MissingDirectory {
            path: path.to_path_buf(),
        })
    }
}

/// Exclusive lock on `<cache_dir>/private/exlock`, released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _lock: Flock<File>,
}

impl InstanceLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Take the instance lock without blocking.
pub fn acquire_instance_lock(cache_dir: &Path) -> Result<InstanceLock, StartupError> {
    let path = cache_dir.join(INSTANCE_LOCK);
    let io_err = |source| StartupError::Io {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(&path)
        .map_err(io_err)?;

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(lock) => Ok(InstanceLock { path, _lock: lock }),
        Err((_file, Errno::EWOULDBLOCK)) => Err(StartupError::AlreadyRunning { path }),
        Err((_file, source)) => Err(StartupError::Lock { path, source }),
    }
}

/// Detach from the controlling terminal. Must run before any runtime
/// thread exists.
pub fn daemonize() -> Result<(), StartupError> {
    unistd::daemon(false, false).map_err(StartupError::Daemonize)
}

pub fn write_pidfile(path: &Path) -> Result<(), StartupError> {
    fs::write(path, format!("{}\n", std::process::id())).map_err(|source| StartupError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Best effort; after chroot the path may no longer resolve.
pub fn remove_pidfile(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::debug!(path = %path.display(), error = %e, "Pidfile not removed");
    }
}

/// Apply the configured `chroot`, `group` and `user`.
///
/// The identity switch only happens when running as root; an unprivileged
/// daemon keeps its identity and only fails if chroot was requested. The
/// supplementary group list is reduced to the target group.
pub fn drop_privileges(config: &Config) -> Result<(), StartupError> {
    let is_root = Uid::effective().is_root();

    let user = match config.user() {
        Some(name) if is_root => Some(lookup_user(name)?),
        _ => None,
    };
    let gid = match config.group() {
        Some(name) if is_root => Some(lookup_group(name)?),
        _ => user.as_ref().map(|u| u.gid),
    };

    if let Some(root) = config.chroot() {
        require_dir(&root)?;
        unistd::chroot(&root).map_err(|source| StartupError::Privileges {
            step: "chroot",
            source,
        })?;
        unistd::chdir("/").map_err(|source| StartupError::Privileges {
            step: "chdir",
            source,
        })?;
        tracing::info!(root = %root.display(), "Confined to chroot");
    }

    if let Some(gid) = gid {
        // root's supplementary groups (gid 0 among them) must not survive
        unistd::setgroups(&[gid]).map_err(|source| StartupError::Privileges {
            step: "setgroups",
            source,
        })?;
        unistd::setgid(gid).map_err(|source| StartupError::Privileges {
            step: "setgid",
            source,
        })?;
    }
    if let Some(user) = user {
        unistd::setuid(user.uid).map_err(|source| StartupError::Privileges {
            step: "setuid",
            source,
        })?;
        tracing::info!(user = %user.name, "Dropped privileges");
    }
    Ok(())
}

fn lookup_user(name: &str) -> Result<User, StartupError> {
    let found = match name.parse::<u32>() {
        Ok(uid) => User::from_uid(Uid::from_raw(uid)),
        Err(_) => User::from_name(name),
    };
    found
        .ok()
        .flatten()
        .ok_or_else(|| StartupError::UnknownUser(name.to_string()))
}

fn lookup_group(name: &str) -> Result<Gid, StartupError> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(Gid::from_raw(gid));
    }
    Group::from_name(name)
        .ok()
        .flatten()
        .map(|g| g.gid)
        .ok_or_else(|| StartupError::UnknownGroup(name.to_string()))
}

/// Peer address of the socket on stdin (inetd mode).
pub fn stdin_peer() -> Option<IpAddr> {
    socket_peer(0)
}

fn socket_peer(fd: RawFd) -> Option<IpAddr> {
    let addr = getpeername::<SockaddrStorage>(fd).ok()?;
    if let Some(v4) = addr.as_sockaddr_in() {
        Some(IpAddr::V4(*SocketAddrV4::from(*v4).ip()))
    } else if let Some(v6) = addr.as_sockaddr_in6() {
        Some(IpAddr::V6(*SocketAddrV6::from(*v6).ip()))
    } else {
        tracing::debug!(family = ?addr.family(), "stdin peer is not an IP socket");
        None
    }
}
