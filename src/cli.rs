//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, Overrides, DEFAULT_CONFIG_PATH};
use crate::lifecycle::Mode;

/// Environment variable that switches the binary into CGI mode.
pub const CGI_MODE_VAR: &str = "CGI_MODE";

#[derive(Debug, Parser)]
#[command(name = "pkg-cacher", version, about = "Caching proxy daemon for package archives")]
pub struct Cli {
    /// Configuration file
    #[arg(short = 'c', value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Serve one connection on stdin/stdout (inetd mode)
    #[arg(short = 'i')]
    pub inetd: bool,

    /// Detach from the terminal
    #[arg(short = 'd')]
    pub daemonize: bool,

    /// chroot into DIR after binding
    #[arg(short = 'r', value_name = "DIR")]
    pub chroot: Option<PathBuf>,

    /// Bind attempts per address
    #[arg(short = 'R', value_name = "N")]
    pub retry: Option<u32>,

    /// Write the daemon's pid to FILE
    #[arg(short = 'p', value_name = "FILE")]
    pub pidfile: Option<PathBuf>,

    /// Configuration overrides
    #[arg(value_name = "KEY=VALUE")]
    pub pairs: Vec<String>,
}

impl Cli {
    /// Layered overrides for `mode`. `env` is only consulted in CGI mode.
    pub fn overrides<I>(&self, mode: Mode, env: I) -> Result<Overrides, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides = Overrides::new();
        if let Some(retry) = self.retry {
            overrides = overrides.option("retry", retry.to_string());
        }
        if let Some(pidfile) = &self.pidfile {
            overrides = overrides.option("pidfile", pidfile.display().to_string());
        }
        if let Some(root) = &self.chroot {
            overrides = overrides.option("chroot", root.display().to_string());
        }
        if mode == Mode::Cgi {
            overrides = overrides.with_env(env);
        }
        overrides.with_pairs(&self.pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pkg-cacher").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.inetd);
        assert!(!cli.daemonize);
        assert!(cli.pairs.is_empty());
    }

    #[test]
    fn options_become_overrides() {
        let cli = parse(&["-c", "/tmp/p.conf", "-R", "3", "-p", "/run/p.pid", "-r", "/srv", "limit=5"]);
        assert_eq!(cli.config, PathBuf::from("/tmp/p.conf"));

        let overrides = cli.overrides(Mode::Standalone, Vec::new()).unwrap();
        assert_eq!(
            overrides.options,
            vec![
                ("retry".to_string(), "3".to_string()),
                ("pidfile".to_string(), "/run/p.pid".to_string()),
                ("chroot".to_string(), "/srv".to_string()),
            ]
        );
        assert_eq!(overrides.pairs, vec![("limit".to_string(), "5".to_string())]);
    }

    #[test]
    fn environment_only_counts_in_cgi_mode() {
        let cli = parse(&[]);
        let env = || vec![("PKG_CACHER_OFFLINE_MODE".to_string(), "1".to_string())];

        assert!(cli.overrides(Mode::Standalone, env()).unwrap().env.is_empty());
        assert_eq!(
            cli.overrides(Mode::Cgi, env()).unwrap().env,
            vec![("offline_mode".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn malformed_pair_is_rejected() {
        let cli = parse(&["no-equals-sign"]);
        assert!(matches!(
            cli.overrides(Mode::Standalone, Vec::new()),
            Err(ConfigError::Override(_))
        ));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(Cli::try_parse_from(["pkg-cacher", "-x"]).is_err());
    }
}
