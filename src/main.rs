//! pkg-cacher daemon entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI + CGI_MODE ──▶ ConfigStore ──▶ ModeDispatcher
//!                                         │
//!            ┌────────────────────────────┼──────────────────────┐
//!            ▼                            ▼                      ▼
//!       standalone                      inetd                   cgi
//!   ListenerSet ─▶ Supervisor      stdin/stdout once      stdin/stdout once
//!        │            │                    │                     │
//!        │      connection workers ────────┴──▶ RequestHandler ◀─┘
//!        │            │
//!   ControlPlane ◀── signals (TERM/INT, HUP, USR1)
//!        │
//!   LogChannel (access.log, error.log; flock per record)
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use pkg_cacher::cli::{Cli, CGI_MODE_VAR};
use pkg_cacher::http::UnavailableHandler;
use pkg_cacher::observability::init_tracing;
use pkg_cacher::{ConfigStore, Mode, ModeDispatcher};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = Mode::select(cli.inetd, std::env::var_os(CGI_MODE_VAR).is_some());

    let store = match cli
        .overrides(mode, std::env::vars())
        .and_then(|overrides| ConfigStore::load(cli.config.clone(), overrides))
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("pkg-cacher: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(store.debug_enabled());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        %mode,
        config = %cli.config.display(),
        "pkg-cacher starting"
    );

    let dispatcher = ModeDispatcher::new(mode, store, UnavailableHandler).daemonize(cli.daemonize);
    match dispatcher.run() {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
