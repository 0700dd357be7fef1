//! Operating modes and the entry path of each.
//!
//! # Data Flow
//! ```text
//! standalone:
//!     cache_dir check → instance lock → [-d daemonize] → runtime
//!     → bind ListenerSet → pidfile → chroot/setuid → open logs
//!     → signals + ControlPlane → listener workers + last accept loop
//!     → terminate workers → remove pidfile
//!
//! inetd:
//!     stdin peer → chroot/setuid → open logs → handler once on stdio
//!
//! cgi:
//!     cgi_advise_to_use set → 410 Gone on stdout, done
//!     otherwise → open logs → handler once on stdio
//! ```

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

use crate::config::ConfigStore;
use crate::context::DaemonContext;
use crate::error::DaemonError;
use crate::http::RequestHandler;
use crate::lifecycle::control::ControlPlane;
use crate::lifecycle::signals;
use crate::lifecycle::startup::{self, StartupError};
use crate::net::{BindPolicy, Connection, ListenerSet};
use crate::supervisor::Supervisor;

/// How this invocation was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Standalone,
    Inetd,
    Cgi,
}

impl Mode {
    /// CGI wins over `-i`; a web server never passes `-i`.
    pub fn select(inetd: bool, cgi: bool) -> Self {
        if cgi {
            Mode::Cgi
        } else if inetd {
            Mode::Inetd
        } else {
            Mode::Standalone
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Standalone => "standalone",
            Mode::Inetd => "inetd",
            Mode::Cgi => "cgi",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The response a retired CGI endpoint sends instead of serving.
pub fn cgi_gone_response(url: &str) -> String {
    format!(
        "Status: 410 Gone\r\nContent-Type: text/plain\r\n\r\n\
         CGI access to this cache is disabled, use {url} instead.\n"
    )
}

/// Drives one invocation in its selected mode.
pub struct ModeDispatcher<H: RequestHandler> {
    mode: Mode,
    daemonize: bool,
    store: Arc<ConfigStore>,
    handler: Arc<H>,
}

impl<H: RequestHandler> ModeDispatcher<H> {
    pub fn new(mode: Mode, store: Arc<ConfigStore>, handler: H) -> Self {
        Self {
            mode,
            daemonize: false,
            store,
            handler: Arc::new(handler),
        }
    }

    /// Detach from the terminal before serving (standalone only).
    pub fn daemonize(mut self, daemonize: bool) -> Self {
        self.daemonize = daemonize;
        self
    }

    pub fn run(self) -> Result<(), DaemonError> {
        tracing::debug!(mode = %self.mode, "Dispatching");
        match self.mode {
            Mode::Standalone => self.run_standalone(),
            Mode::Inetd => self.run_inetd(),
            Mode::Cgi => self.run_cgi(),
        }
    }

    fn run_standalone(self) -> Result<(), DaemonError> {
        let ctx = DaemonContext::new(Mode::Standalone, Arc::clone(&self.store));
        let result = self.standalone(&ctx);
        fatal_logged(&ctx, result)
    }

    fn standalone(self, ctx: &DaemonContext) -> Result<(), DaemonError> {
        let config = ctx.config();
        startup::require_dir(&config.cache_dir())?;
        if let Some(root) = config.chroot() {
            startup::require_dir(&root)?;
        }
        let lock = startup::acquire_instance_lock(&config.cache_dir())?;
        tracing::debug!(lock = %lock.path().display(), "Instance lock held");
        if self.daemonize {
            startup::daemonize()?;
        }

        let policy = BindPolicy::new(config.bind_retries());
        let served = runtime(true)?.block_on(serve(ctx.clone(), self.handler, policy));
        drop(lock);
        served
    }

    fn run_inetd(self) -> Result<(), DaemonError> {
        let ctx = DaemonContext::new(Mode::Inetd, Arc::clone(&self.store));
        let result = self.single_shot(&ctx);
        fatal_logged(&ctx, result)
    }

    fn run_cgi(self) -> Result<(), DaemonError> {
        let config = self.store.snapshot();
        if let Some(url) = config.get("cgi_advise_to_use").map(str::trim).filter(|u| !u.is_empty()) {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(cgi_gone_response(url).as_bytes())?;
            stdout.flush()?;
            return Ok(());
        }

        let ctx = DaemonContext::new(Mode::Cgi, Arc::clone(&self.store));
        let result = self.single_shot(&ctx);
        fatal_logged(&ctx, result)
    }

    /// One connection on stdin/stdout, handled on this thread.
    fn single_shot(self, ctx: &DaemonContext) -> Result<(), DaemonError> {
        let config = ctx.config();
        let client = match ctx.mode() {
            Mode::Cgi => std::env::var("REMOTE_ADDR")
                .ok()
                .and_then(|addr| addr.trim().parse().ok()),
            _ => {
                let peer = startup::stdin_peer();
                startup::drop_privileges(&config)?;
                peer
            }
        };
        ctx.logs().open(&config.log_dir())?;

        let supervisor = Supervisor::new(ctx.clone(), self.handler);
        runtime(false)?.block_on(supervisor.handle_inline(Connection::stdio(client)));
        Ok(())
    }
}

/// The standalone pipeline, from bind to graceful exit.
///
/// Must run inside a runtime. Signals are installed process-wide.
pub async fn serve<H: RequestHandler>(
    ctx: DaemonContext,
    handler: Arc<H>,
    policy: BindPolicy,
) -> Result<(), DaemonError> {
    let config = ctx.config();
    let listeners = ListenerSet::bind(&config.bind_addresses(), config.port(), &policy).await?;

    let pidfile = config.pidfile();
    if let Some(path) = &pidfile {
        startup::write_pidfile(path)?;
    }

    let result = serve_bound(&ctx, handler, listeners).await;

    if let Some(path) = &pidfile {
        startup::remove_pidfile(path);
    }
    result
}

async fn serve_bound<H: RequestHandler>(
    ctx: &DaemonContext,
    handler: Arc<H>,
    listeners: ListenerSet,
) -> Result<(), DaemonError> {
    let config = ctx.config();
    startup::drop_privileges(&config)?;
    ctx.logs().open(&config.log_dir())?;

    let (tx, rx) = mpsc::unbounded_channel();
    signals::install(tx)?;
    let control = tokio::spawn(ControlPlane::new(ctx.clone()).run(rx));

    let supervisor = Supervisor::new(ctx.clone(), handler);
    let served = run_listeners(&supervisor, listeners, config.fork_listeners()).await;

    ctx.shutdown().trigger();
    supervisor.terminate_workers();
    control.abort();
    served
}

/// Give every endpoint but the last its own listener worker, then run the
/// last one on this task (or in a worker too when `fork_last` is set) until
/// shutdown. Every endpoint is closed when this returns.
pub async fn run_listeners<H: RequestHandler>(
    supervisor: &Supervisor<H>,
    listeners: ListenerSet,
    fork_last: bool,
) -> Result<(), DaemonError> {
    let (extra, last) = listeners.into_parts();
    for endpoint in extra {
        supervisor.spawn_listener_worker(endpoint)?;
    }

    match last {
        Some(last) if !fork_last => supervisor.run_accept_loop(&last).await?,
        Some(last) => {
            supervisor.spawn_listener_worker(last)?;
            supervisor.context().shutdown().wait().await;
        }
        None => supervisor.context().shutdown().wait().await,
    }
    supervisor.terminate_workers();
    Ok(())
}

fn runtime(multi_thread: bool) -> Result<Runtime, StartupError> {
    let mut builder = if multi_thread {
        Builder::new_multi_thread()
    } else {
        Builder::new_current_thread()
    };
    builder.enable_all().build().map_err(StartupError::Runtime)
}

/// Fatal errors go to the error log, or standard error before it is open.
fn fatal_logged(ctx: &DaemonContext, result: Result<(), DaemonError>) -> Result<(), DaemonError> {
    if let Err(e) = &result {
        tracing::error!(mode = %ctx.mode(), error = %e, "Fatal");
        let _ = ctx.logs().write_error(&format!("fatal: {e}"));
    }
    result
}
