//! The control loop applying [`ControlEvent`]s to the running daemon.

use tokio::sync::mpsc;

use crate::context::DaemonContext;
use crate::lifecycle::signals::ControlEvent;
use crate::observability::Level;

/// What the control loop should do after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Stop,
}

/// Applies control events one at a time, between accept-loop iterations
/// rather than inside any signal handler.
pub struct ControlPlane {
    ctx: DaemonContext,
}

impl ControlPlane {
    pub fn new(ctx: DaemonContext) -> Self {
        Self { ctx }
    }

    /// Drain `events` until a terminate event arrives or every sender is
    /// gone.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ControlEvent>) {
        while let Some(event) = events.recv().await {
            if self.apply(event).await == ControlFlow::Stop {
                break;
            }
        }
    }

    pub async fn apply(&self, event: ControlEvent) -> ControlFlow {
        match event {
            ControlEvent::Terminate => {
                self.terminate();
                ControlFlow::Stop
            }
            ControlEvent::Reload => {
                self.reload().await;
                ControlFlow::Continue
            }
            ControlEvent::ToggleDebug => {
                self.toggle_debug();
                ControlFlow::Continue
            }
        }
    }

    fn terminate(&self) {
        tracing::info!("Termination requested, no longer accepting");
        self.note(Level::Info, "termination requested");
        self.ctx.shutdown().trigger();
    }

    /// Re-read the startup configuration file on the blocking pool; the
    /// accept loops keep running meanwhile.
    async fn reload(&self) {
        let store = self.ctx.config_store();
        let path = store.config_path().display().to_string();
        let result = tokio::task::spawn_blocking(move || store.reload()).await;

        match result {
            Ok(Ok(summary)) => {
                self.note(
                    Level::Info,
                    &format!("reloaded {path}, changed: {}", summary.changed.join(" ")),
                );
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Reload failed, keeping current configuration");
                self.note(Level::Error, &format!("reload of {path} failed: {e}"));
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload task failed");
            }
        }
    }

    fn toggle_debug(&self) {
        let enabled = self.ctx.config_store().toggle_debug();
        let state = if enabled { "enabled" } else { "disabled" };
        tracing::info!(debug = enabled, "Debug logging toggled");
        self.note(Level::Info, &format!("debug logging {state}"));
    }

    fn note(&self, level: Level, message: &str) {
        if let Err(e) = self.ctx.logs().log(level, message) {
            tracing::warn!(error = %e, "Could not record control event");
        }
    }
}
