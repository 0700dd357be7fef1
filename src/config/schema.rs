//! Configuration schema definitions.
//!
//! The daemon's configuration is a flat map of string keys to string values.
//! Typed accessors interpret the handful of keys the supervisory core cares
//! about; everything else is carried through untouched for the request
//! handler.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration file read when `-c` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pkg-cacher/pkg-cacher.conf";

/// Keys a reload is allowed to change in a running daemon.
///
/// Anything not listed here (cache directory, user, group, chroot, listen
/// addresses) is frozen once the process has started.
pub const RELOADABLE_KEYS: &[&str] = &[
    "allowed_hosts",
    "denied_hosts",
    "allowed_hosts_6",
    "denied_hosts_6",
    "offline_mode",
    "expire_hours",
    "http_proxy",
    "use_proxy",
    "http_proxy_auth",
    "use_proxy_auth",
    "debug",
    "limit",
    "path_map",
];

const DEFAULTS: &[(&str, &str)] = &[
    ("cache_dir", "/var/cache/pkg-cacher"),
    ("logdir", "/var/log/pkg-cacher"),
    ("daemon_port", "3142"),
    ("daemon_addr", ""),
    ("retry", "1"),
    ("fork_listeners", "0"),
    ("debug", "0"),
    ("offline_mode", "0"),
    ("expire_hours", "0"),
    ("limit", "0"),
];

/// Effective daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// An empty configuration with no keys at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in defaults that sit beneath the configuration file.
    pub fn with_defaults() -> Self {
        let mut config = Self::new();
        for (key, value) in DEFAULTS {
            config.set(*key, *value);
        }
        config
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every key of `other` over this configuration.
    pub fn merge(&mut self, other: &Config) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }

    /// Interpret a key as a flag. Missing keys are `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1" | "yes" | "true" | "on")
        )
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Split a comma/semicolon separated value, dropping empty items.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split([',', ';'])
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.get_path("cache_dir")
            .unwrap_or_else(|| PathBuf::from("/var/cache/pkg-cacher"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.get_path("logdir")
            .unwrap_or_else(|| PathBuf::from("/var/log/pkg-cacher"))
    }

    pub fn port(&self) -> u16 {
        self.get("daemon_port")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(3142)
    }

    /// Configured listen addresses. Empty means "all interfaces".
    pub fn bind_addresses(&self) -> Vec<String> {
        self.get_list("daemon_addr")
    }

    /// Number of bind attempts per endpoint; never less than one.
    pub fn bind_retries(&self) -> u32 {
        self.get_u32("retry").unwrap_or(1).max(1)
    }

    /// Whether the last listener also gets its own worker instead of
    /// running in the supervisor.
    pub fn fork_listeners(&self) -> bool {
        self.get_bool("fork_listeners")
    }

    pub fn debug(&self) -> bool {
        self.get_bool("debug")
    }

    pub fn pidfile(&self) -> Option<PathBuf> {
        self.get_path("pidfile")
    }

    pub fn chroot(&self) -> Option<PathBuf> {
        self.get_path("chroot")
    }

    pub fn user(&self) -> Option<&str> {
        self.get("user").map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn group(&self) -> Option<&str> {
        self.get("group").map(str::trim).filter(|v| !v.is_empty())
    }
}
