//! The accept loop run by the supervisor and by every listener worker.

use crate::http::RequestHandler;
use crate::net::{Connection, Endpoint};
use crate::supervisor::worker::{Supervisor, SupervisorError};

impl<H: RequestHandler> Supervisor<H> {
    /// Accept on `endpoint` until shutdown, spawning one worker per
    /// connection without waiting for it.
    ///
    /// The terminating flag is checked after every accept: a connection that
    /// arrives once shutdown has started is closed instead of handed to a
    /// worker. On exit every worker this supervisor still tracks is
    /// terminated.
    pub async fn run_accept_loop(&self, endpoint: &Endpoint) -> Result<(), SupervisorError> {
        let shutdown = self.ctx.shutdown().clone();
        let mut stop = shutdown.subscribe();

        tracing::info!(
            endpoint = %endpoint.label(),
            local = ?endpoint.local_addr().ok(),
            "Accepting connections"
        );

        let result = loop {
            if shutdown.is_triggered() {
                break Ok(());
            }

            let accepted = tokio::select! {
                accepted = endpoint.accept() => Some(accepted),
                _ = stop.recv() => None,
            };
            let Some(accepted) = accepted else {
                break Ok(());
            };
            if shutdown.is_triggered() {
                break Ok(());
            }

            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(peer_addr = %peer, endpoint = %endpoint.label(), "Connection accepted");
                    if let Err(e) = self.spawn_connection_worker(Connection::tcp(stream, peer.ip())) {
                        break Err(e);
                    }
                }
                Err(e) => {
                    // accept can fail transiently (aborted handshakes, EINTR, fd pressure)
                    tracing::debug!(endpoint = %endpoint.label(), error = %e, "Accept returned no connection");
                    let _ = self.ctx.logs().debug(&format!("accept on {}: {e}", endpoint.label()));
                    tokio::task::yield_now().await;
                }
            }
        };

        self.terminate_workers();
        tracing::info!(endpoint = %endpoint.label(), "Accept loop stopped");
        result
    }
}
