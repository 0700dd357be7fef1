//! Registry of live workers.
//!
//! # Responsibilities
//! - Generate unique worker IDs for tracing
//! - Track every spawned worker until it exits
//! - Deliver termination (task abort) to all tracked workers

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::AbortHandle;

/// Global atomic counter for worker IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Generate a new unique worker ID.
    pub fn new() -> Self {
        Self(WORKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// What a worker is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerKind {
    /// Handling one client connection.
    Connection { client: Option<IpAddr> },
    /// Running the accept loop of one extra endpoint.
    Listener { endpoint: String },
}

/// One spawned worker, owned by the supervisor that spawned it.
#[derive(Debug)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub kind: WorkerKind,
    started: Instant,
    abort: AbortHandle,
}

impl WorkerRecord {
    pub fn new(id: WorkerId, kind: WorkerKind, abort: AbortHandle) -> Self {
        Self {
            id,
            kind,
            started: Instant::now(),
            abort,
        }
    }

    /// How long the worker has been running.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    fn terminate(&self) {
        self.abort.abort();
    }
}

/// Live workers of one supervisor.
///
/// Cloning shares the same registry; a fresh registry starts empty.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    inner: Arc<DashMap<WorkerId, WorkerRecord>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: WorkerRecord) {
        self.inner.insert(record.id, record);
    }

    /// Forget a worker that has exited.
    pub fn remove(&self, id: WorkerId) -> Option<WorkerRecord> {
        self.inner.remove(&id).map(|(_, record)| record)
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.inner.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Terminate and forget every tracked worker. Returns how many there were.
    pub fn terminate_all(&self) -> usize {
        let ids = self.ids();
        let mut terminated = 0;
        for id in ids {
            if let Some(record) = self.remove(id) {
                tracing::debug!(
                    worker = %record.id,
                    kind = ?record.kind,
                    age = ?record.age(),
                    "Terminating worker"
                );
                record.terminate();
                terminated += 1;
            }
        }
        terminated
    }
}
