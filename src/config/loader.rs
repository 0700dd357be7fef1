//! Configuration loading from disk.
//!
//! The file grammar is owned by a [`ConfigLoader`]; this module only decides
//! which loader reads a given path and how its result is layered with the
//! built-in defaults and the command-line/environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::config::validation::{validate_config, ValidationError};

/// Environment prefix for CGI-mode overrides (`PKG_CACHER_DEBUG=1`).
pub const ENV_PREFIX: &str = "PKG_CACHER_";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line}: {reason}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid override `{0}`, expected key=value")]
    Override(String),
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses a configuration file into raw key/value pairs.
pub trait ConfigLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Config, ConfigError>;
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The classic `key = value` grammar with `#` comment lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfFileLoader;

impl ConfFileLoader {
    pub fn parse(&self, path: &Path, content: &str) -> Result<Config, ConfigError> {
        let mut config = Config::new();
        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: format!("expected `key = value`, found `{line}`"),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: "empty key".to_string(),
                });
            }
            config.set(key, value.trim());
        }
        Ok(config)
    }
}

impl ConfigLoader for ConfFileLoader {
    fn load(&self, path: &Path) -> Result<Config, ConfigError> {
        let content = read(path)?;
        self.parse(path, &content)
    }
}

/// Flat TOML tables. Scalars are stringified, string arrays are joined
/// with `", "` so they read back through [`Config::get_list`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlLoader;

impl TomlLoader {
    pub fn parse(&self, path: &Path, content: &str) -> Result<Config, ConfigError> {
        let table: toml::Table = toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Config::new();
        for (key, value) in table {
            let rendered = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => (if b { "1" } else { "0" }).to_string(),
                toml::Value::Array(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            toml::Value::String(s) => parts.push(s),
                            other => parts.push(other.to_string()),
                        }
                    }
                    parts.join(", ")
                }
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Table(_) => {
                    return Err(ConfigError::Syntax {
                        path: path.to_path_buf(),
                        line: 0,
                        reason: format!("`{key}`: nested tables are not supported"),
                    })
                }
            };
            config.set(key, rendered);
        }
        Ok(config)
    }
}

impl ConfigLoader for TomlLoader {
    fn load(&self, path: &Path) -> Result<Config, ConfigError> {
        let content = read(path)?;
        self.parse(path, &content)
    }
}

/// Pick a loader by file extension.
pub fn loader_for(path: &Path) -> Box<dyn ConfigLoader> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Box::new(TomlLoader),
        _ => Box::new(ConfFileLoader),
    }
}

/// Values layered over the configuration file, lowest precedence first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Single-letter command-line options (`-R`, `-p`, `-r`).
    pub options: Vec<(String, String)>,
    /// `PKG_CACHER_<KEY>` environment variables (CGI mode only).
    pub env: Vec<(String, String)>,
    /// Trailing `key=value` command-line tokens.
    pub pairs: Vec<(String, String)>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.options.push((key.to_string(), value.into()));
        self
    }

    /// Parse trailing `key=value` tokens.
    pub fn with_pairs<I, S>(mut self, tokens: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            self.pairs.push(parse_pair(token.as_ref())?);
        }
        Ok(self)
    }

    /// Collect `PKG_CACHER_<KEY>` variables as lower-cased `<key>` entries.
    pub fn with_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                if !key.is_empty() {
                    self.env.push((key.to_ascii_lowercase(), value));
                }
            }
        }
        self
    }

    pub fn apply(&self, config: &mut Config) {
        for (key, value) in self.options.iter().chain(&self.env).chain(&self.pairs) {
            config.set(key.as_str(), value.as_str());
        }
    }
}

fn parse_pair(token: &str) -> Result<(String, String), ConfigError> {
    match token.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConfigError::Override(token.to_string())),
    }
}

/// Load, layer and validate the effective configuration.
pub fn load_config(
    loader: &dyn ConfigLoader,
    path: &Path,
    overrides: &Overrides,
) -> Result<Config, ConfigError> {
    let mut config = Config::with_defaults();
    config.merge(&loader.load(path)?);
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn conf_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn conf_grammar_skips_comments_and_trims() {
        let config = ConfFileLoader
            .parse(Path::new("t.conf"), "# comment\n\n cache_dir = /srv/cache \nlimit=10\n")
            .unwrap();
        assert_eq!(config.get("cache_dir"), Some("/srv/cache"));
        assert_eq!(config.get("limit"), Some("10"));
        assert_eq!(config.len(), 2);
    }

    #[test]
    fn conf_grammar_rejects_bare_words() {
        let err = ConfFileLoader
            .parse(Path::new("t.conf"), "debug = 1\nnonsense\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 2, .. }));
    }

    #[test]
    fn toml_values_are_flattened() {
        let config = TomlLoader
            .parse(
                Path::new("t.toml"),
                "debug = true\ndaemon_port = 8080\ndaemon_addr = [\"127.0.0.1\", \"::1\"]\n",
            )
            .unwrap();
        assert!(config.debug());
        assert_eq!(config.port(), 8080);
        assert_eq!(config.bind_addresses(), vec!["127.0.0.1", "::1"]);
    }

    #[test]
    fn toml_rejects_nested_tables() {
        let err = TomlLoader
            .parse(Path::new("t.toml"), "[server]\nport = 1\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(&ConfFileLoader, Path::new("/nonexistent/pkg.conf"), &Overrides::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn pair_overrides_win_over_file_options_and_env() {
        let file = conf_file("limit = 1\ndebug = 0\n");
        let overrides = Overrides::new()
            .option("limit", "2")
            .with_env(vec![("PKG_CACHER_LIMIT".to_string(), "3".to_string())])
            .with_pairs(["limit=4"])
            .unwrap();
        let config = load_config(&ConfFileLoader, file.path(), &overrides).unwrap();
        assert_eq!(config.get("limit"), Some("4"));
        assert_eq!(config.get("debug"), Some("0"));
    }

    #[test]
    fn env_overrides_are_lower_cased_and_filtered() {
        let overrides = Overrides::new().with_env(vec![
            ("PKG_CACHER_OFFLINE_MODE".to_string(), "1".to_string()),
            ("PATH".to_string(), "/bin".to_string()),
            ("PKG_CACHER_".to_string(), "x".to_string()),
        ]);
        assert_eq!(overrides.env, vec![("offline_mode".to_string(), "1".to_string())]);
    }

    #[test]
    fn malformed_pair_is_rejected() {
        assert!(matches!(
            Overrides::new().with_pairs(["=1"]),
            Err(ConfigError::Override(_))
        ));
        assert!(matches!(
            Overrides::new().with_pairs(["debug"]),
            Err(ConfigError::Override(_))
        ));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let file = conf_file("daemon_port = http\n");
        let err = load_config(&ConfFileLoader, file.path(), &Overrides::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
