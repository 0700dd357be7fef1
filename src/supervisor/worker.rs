//! Spawning and reaping isolated workers.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::runtime::{Handle, TryCurrentError};

use crate::context::DaemonContext;
use crate::http::{is_broken_pipe, HandlerError, RequestHandler};
use crate::net::{Connection, Endpoint};
use crate::observability::LogChannel;
use crate::supervisor::registry::{WorkerId, WorkerKind, WorkerRecord, WorkerRegistry};

/// Failures that make continuing to accept unsafe.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// No runtime to spawn an isolated worker on.
    #[error("cannot spawn worker: {0}")]
    Spawn(#[from] TryCurrentError),
}

/// Spawns one worker per connection (or per extra endpoint) and keeps
/// track of them until they exit.
///
/// Dropping a supervisor terminates every worker it still tracks, so a
/// listener worker that is terminated takes its connection workers with it.
pub struct Supervisor<H: RequestHandler> {
    pub(crate) ctx: DaemonContext,
    handler: Arc<H>,
    registry: WorkerRegistry,
}

impl<H: RequestHandler> Supervisor<H> {
    pub fn new(ctx: DaemonContext, handler: Arc<H>) -> Self {
        Self {
            ctx,
            handler,
            registry: WorkerRegistry::new(),
        }
    }

    /// A supervisor for a listener worker: same daemon, empty registry.
    fn child(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            handler: Arc::clone(&self.handler),
            registry: WorkerRegistry::new(),
        }
    }

    pub fn context(&self) -> &DaemonContext {
        &self.ctx
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Terminate every tracked worker.
    pub fn terminate_workers(&self) -> usize {
        let terminated = self.registry.terminate_all();
        if terminated > 0 {
            tracing::info!(count = terminated, "Terminated workers");
        }
        terminated
    }

    /// Hand `conn` to the request handler in a worker of its own.
    pub fn spawn_connection_worker(&self, conn: Connection) -> Result<WorkerId, SupervisorError> {
        let client = conn.client();
        let kind = WorkerKind::Connection { client };
        let handler = Arc::clone(&self.handler);
        let hctx = self.ctx.handler_context(client);
        let logs = Arc::clone(self.ctx.logs());

        self.spawn_tracked(kind, move |id| async move {
            let outcome = AssertUnwindSafe(async { handler.handle(conn, hctx).await })
                .catch_unwind()
                .await;
            report_outcome(&logs, id, outcome);
        })
    }

    /// Handle `conn` on the current task (inetd and CGI modes, where the
    /// process itself is the worker). Failures are contained the same way.
    pub async fn handle_inline(&self, conn: Connection) {
        let id = WorkerId::new();
        let hctx = self.ctx.handler_context(conn.client());
        let handler = Arc::clone(&self.handler);
        let outcome = AssertUnwindSafe(async { handler.handle(conn, hctx).await })
            .catch_unwind()
            .await;
        report_outcome(self.ctx.logs(), id, outcome);
    }

    /// Run the accept loop of `endpoint` in a worker of its own.
    ///
    /// The worker gets an empty registry of its own; it only ever tracks
    /// the connection workers it spawns itself.
    pub fn spawn_listener_worker(&self, endpoint: Endpoint) -> Result<WorkerId, SupervisorError> {
        let kind = WorkerKind::Listener {
            endpoint: endpoint.label().to_string(),
        };
        let child = self.child();

        self.spawn_tracked(kind, move |id| async move {
            if let Err(e) = child.run_accept_loop(&endpoint).await {
                tracing::error!(worker = %id, error = %e, "Listener worker failed, shutting down");
                let _ = child.ctx.logs().write_error(&format!("{id}: {e}"));
                child.ctx.shutdown().trigger();
            }
        })
    }

    fn spawn_tracked<F, Fut>(&self, kind: WorkerKind, work: F) -> Result<WorkerId, SupervisorError>
    where
        F: FnOnce(WorkerId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current()?;
        let id = WorkerId::new();
        let registry = self.registry.clone();
        let work = work(id);

        let handle = runtime.spawn(async move {
            work.await;
            registry.remove(id);
        });

        tracing::debug!(worker = %id, ?kind, "Worker spawned");
        self.registry
            .insert(WorkerRecord::new(id, kind, handle.abort_handle()));
        // Reaped before it was recorded.
        if handle.is_finished() {
            self.registry.remove(id);
        }
        Ok(id)
    }
}

impl<H: RequestHandler> Drop for Supervisor<H> {
    fn drop(&mut self) {
        self.registry.terminate_all();
    }
}

fn report_outcome(
    logs: &LogChannel,
    id: WorkerId,
    outcome: Result<Result<(), HandlerError>, Box<dyn Any + Send>>,
) {
    let written = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if is_broken_pipe(&e) => logs.debug(&format!("{id}: client went away: {e}")),
        Ok(Err(e)) => logs.write_error(&format!("{id}: {e}")),
        Err(panic) => {
            let info = panic_message(panic.as_ref());
            tracing::error!(worker = %id, panic = %info, "Worker panicked");
            logs.write_error(&format!("{id} panicked: {info}"))
        }
    };
    if let Err(e) = written {
        tracing::warn!(worker = %id, error = %e, "Could not record worker outcome");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
