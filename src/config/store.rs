//! Live configuration shared by every component of the daemon.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::loader::{load_config, loader_for, ConfigError, ConfigLoader, Overrides};
use crate::config::path_map::PathMap;
use crate::config::schema::{Config, RELOADABLE_KEYS};

/// Holds the effective configuration and its derived [`PathMap`].
///
/// Readers take cheap snapshots; reloads and debug toggles publish a new
/// snapshot atomically. The file is read before anything is swapped, so no
/// reader ever waits on disk I/O.
pub struct ConfigStore {
    path: PathBuf,
    overrides: Overrides,
    loader: Box<dyn ConfigLoader>,
    live: ArcSwap<Config>,
    path_map: ArcSwap<PathMap>,
}

/// Keys whose value changed during a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub changed: Vec<String>,
}

impl ConfigStore {
    /// Load the configuration at `path`, picking the loader by extension.
    pub fn load(path: impl Into<PathBuf>, overrides: Overrides) -> Result<Self, ConfigError> {
        let path = path.into();
        let loader = loader_for(&path);
        Self::with_loader(loader, path, overrides)
    }

    /// The path is made absolute first: reload must still find the file
    /// after `-d` has changed the working directory to `/`.
    pub fn with_loader(
        loader: Box<dyn ConfigLoader>,
        path: impl Into<PathBuf>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        let path = std::path::absolute(&path).map_err(|source| ConfigError::Io { path, source })?;
        let config = load_config(loader.as_ref(), &path, &overrides)?;
        let path_map = PathMap::parse(config.get("path_map").unwrap_or_default());

        tracing::debug!(path = %path.display(), keys = config.len(), "Configuration loaded");

        Ok(Self {
            path,
            overrides,
            loader,
            live: ArcSwap::from_pointee(config),
            path_map: ArcSwap::from_pointee(path_map),
        })
    }

    /// Build a store around an already layered configuration.
    pub fn from_config(config: Config, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path_map = PathMap::parse(config.get("path_map").unwrap_or_default());
        Self {
            loader: loader_for(&path),
            path,
            overrides: Overrides::new(),
            live: ArcSwap::from_pointee(config),
            path_map: ArcSwap::from_pointee(path_map),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.live.load_full()
    }

    pub fn path_map(&self) -> Arc<PathMap> {
        self.path_map.load_full()
    }

    pub fn debug_enabled(&self) -> bool {
        self.live.load().debug()
    }

    /// Flip the `debug` key and return its new value.
    pub fn toggle_debug(&self) -> bool {
        let previous = self.live.rcu(|current| {
            let mut next = Config::clone(current);
            next.set("debug", if current.debug() { "0" } else { "1" });
            next
        });
        !previous.debug()
    }

    /// Re-read the configuration file and copy the reloadable keys into the
    /// live configuration. Every other key keeps its startup value.
    ///
    /// The stored command-line overrides are re-applied on top of the file
    /// so a `key=value` given at startup keeps winning.
    pub fn reload(&self) -> Result<ReloadSummary, ConfigError> {
        let fresh = load_config(self.loader.as_ref(), &self.path, &self.overrides)?;

        let mut summary = ReloadSummary::default();
        let previous = self.live.rcu(|current| {
            let mut next = Config::clone(current);
            for key in RELOADABLE_KEYS {
                match fresh.get(key) {
                    Some(value) => next.set(*key, value),
                    None => {
                        next.remove(key);
                    }
                }
            }
            next
        });

        let current = self.live.load();
        for key in RELOADABLE_KEYS {
            if previous.get(key) != current.get(key) {
                summary.changed.push(key.to_string());
            }
        }

        self.path_map
            .store(Arc::new(PathMap::parse(current.get("path_map").unwrap_or_default())));

        tracing::info!(
            path = %self.path.display(),
            changed = ?summary.changed,
            "Configuration reloaded"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("live", &self.live.load())
            .finish_non_exhaustive()
    }
}
