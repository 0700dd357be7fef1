//! TCP listener implementation with bind retry.
//!
//! # Responsibilities
//! - Bind one endpoint per configured address (or one on all interfaces)
//! - Retry failed binds with a fixed backoff until the budget runs out
//! - Prefer an IPv6 socket, falling back to IPv4 where IPv6 is unavailable
//! - Designate the last endpoint, which may run in the supervisor itself

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{lookup_host, TcpListener, TcpStream};

/// Delay between two bind attempts on the same endpoint.
pub const BIND_BACKOFF: Duration = Duration::from_secs(5);

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Every attempt on this endpoint failed.
    #[error("failed to bind {addr} after {attempts} attempt(s): {source}")]
    Exhausted {
        addr: String,
        attempts: u32,
        source: io::Error,
    },
}

/// How hard to try before giving up on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl BindPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff: BIND_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for BindPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A bound listening socket for one configured address.
#[derive(Debug)]
pub struct Endpoint {
    label: String,
    inner: TcpListener,
}

impl Endpoint {
    /// The address as configured, `*` for all interfaces.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept().await
    }
}

/// All endpoints of a standalone daemon, in configuration order.
#[derive(Debug)]
pub struct ListenerSet {
    endpoints: Vec<Endpoint>,
}

impl ListenerSet {
    /// Bind every address, or a single all-interfaces endpoint when
    /// `addresses` is empty. Any endpoint exhausting its budget fails the
    /// whole set; endpoints already bound are closed on return.
    pub async fn bind(
        addresses: &[String],
        port: u16,
        policy: &BindPolicy,
    ) -> Result<Self, BindError> {
        let targets: Vec<Option<&str>> = if addresses.is_empty() {
            vec![None]
        } else {
            addresses.iter().map(|a| Some(a.as_str())).collect()
        };

        let mut endpoints = Vec::with_capacity(targets.len());
        for host in targets {
            let label = host.unwrap_or("*").to_string();
            let inner = bind_with_retry(&label, policy, || bind_once(host, port)).await?;
            tracing::info!(
                address = %label,
                local = ?inner.local_addr().ok(),
                "Listener bound"
            );
            endpoints.push(Endpoint { label, inner });
        }
        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Split into the endpoints that always get their own listener worker
    /// and the designated last endpoint.
    pub fn into_parts(mut self) -> (Vec<Endpoint>, Option<Endpoint>) {
        let last = self.endpoints.pop();
        (self.endpoints, last)
    }
}

/// Run `attempt` until it succeeds or `policy.attempts` runs out, sleeping
/// `policy.backoff` between tries.
pub async fn bind_with_retry<F, Fut, T>(
    label: &str,
    policy: &BindPolicy,
    mut attempt: F,
) -> Result<T, BindError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut tried = 0;
    loop {
        tried += 1;
        match attempt().await {
            Ok(bound) => return Ok(bound),
            Err(e) if tried < attempts => {
                tracing::warn!(
                    address = %label,
                    attempt = tried,
                    of = attempts,
                    delay = ?policy.backoff,
                    error = %e,
                    "Bind failed, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => {
                return Err(BindError::Exhausted {
                    addr: label.to_string(),
                    attempts: tried,
                    source: e,
                })
            }
        }
    }
}

async fn bind_once(host: Option<&str>, port: u16) -> io::Result<TcpListener> {
    let Some(host) = host else {
        return match TcpListener::bind((Ipv6Addr::UNSPECIFIED, port)).await {
            Ok(listener) => Ok(listener),
            Err(e) if ipv6_unavailable(&e) => TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await,
            Err(e) => Err(e),
        };
    };

    let mut candidates: Vec<SocketAddr> = lookup_host((host, port)).await?.collect();
    candidates.sort_by_key(|addr| !addr.is_ipv6());

    let mut last_err = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("{host} did not resolve to any address"),
    );
    for addr in candidates {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

fn ipv6_unavailable(e: &io::Error) -> bool {
    !matches!(
        e.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> BindPolicy {
        BindPolicy::new(attempts).with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn exhausts_exactly_the_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = bind_with_retry("test", &fast(4), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::from(io::ErrorKind::AddrInUse)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(BindError::Exhausted { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let result = bind_with_retry("test", &fast(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(io::Error::from(io::ErrorKind::AddrInUse))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_budget_still_tries_once() {
        let calls = AtomicU32::new(0);
        let policy = BindPolicy {
            attempts: 0,
            backoff: Duration::from_millis(1),
        };
        let _ = bind_with_retry("test", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(io::Error::from(io::ErrorKind::AddrInUse)) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_endpoint_is_the_last_configured_address() {
        let addrs = vec!["127.0.0.1".to_string(), "localhost".to_string()];
        let set = ListenerSet::bind(&addrs, 0, &fast(1)).await.unwrap();
        assert_eq!(set.len(), 2);

        let (others, last) = set.into_parts();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].label(), "127.0.0.1");
        assert_eq!(last.unwrap().label(), "localhost");
    }

    #[tokio::test]
    async fn no_address_means_one_wildcard_endpoint() {
        let set = ListenerSet::bind(&[], 0, &fast(1)).await.unwrap();
        assert_eq!(set.len(), 1);
        let endpoint = set.iter().next().unwrap();
        assert_eq!(endpoint.label(), "*");
        assert!(endpoint.local_addr().unwrap().ip().is_unspecified());
    }
}
