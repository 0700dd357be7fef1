//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal streams (SIGTERM, SIGINT, SIGHUP, SIGUSR1)
//! - Translate signals to [`ControlEvent`]s on a channel
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Listeners only enqueue; the control loop does the work
//! - SIGHUP triggers config reload, not shutdown
//! - SIGPIPE stays ignored (Rust's default); broken pipes surface as
//!   `BrokenPipe` write errors inside the worker

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// A control operation requested from outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Terminate,
    Reload,
    ToggleDebug,
}

impl ControlEvent {
    /// The event a signal maps to, if any.
    pub fn from_signal(kind: SignalKind) -> Option<Self> {
        if kind == SignalKind::terminate() || kind == SignalKind::interrupt() {
            Some(ControlEvent::Terminate)
        } else if kind == SignalKind::hangup() {
            Some(ControlEvent::Reload)
        } else if kind == SignalKind::user_defined1() {
            Some(ControlEvent::ToggleDebug)
        } else {
            None
        }
    }
}

const CONTROL_SIGNALS: [(SignalKind, &str); 4] = [
    (SignalKind::terminate(), "SIGTERM"),
    (SignalKind::interrupt(), "SIGINT"),
    (SignalKind::hangup(), "SIGHUP"),
    (SignalKind::user_defined1(), "SIGUSR1"),
];

/// Install the control signal listeners. Each delivery becomes one event on
/// `tx`; the listeners stop once the receiver is dropped.
pub fn install(tx: mpsc::UnboundedSender<ControlEvent>) -> std::io::Result<()> {
    for (kind, name) in CONTROL_SIGNALS {
        let Some(event) = ControlEvent::from_signal(kind) else {
            continue;
        };
        let mut stream = signal(kind)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                tracing::debug!(signal = name, ?event, "Signal received");
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
    }
    Ok(())
}
