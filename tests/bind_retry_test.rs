//! Bind retry budget against real sockets.

use std::time::{Duration, Instant};

use pkg_cacher::net::{BindError, BindPolicy, ListenerSet};

#[tokio::test]
async fn occupied_port_exhausts_the_budget() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let policy = BindPolicy::new(3).with_backoff(Duration::from_millis(20));

    let started = Instant::now();
    let err = ListenerSet::bind(&["127.0.0.1".to_string()], port, &policy)
        .await
        .unwrap_err();

    let BindError::Exhausted { addr, attempts, .. } = err;
    assert_eq!(addr, "127.0.0.1");
    assert_eq!(attempts, 3);
    assert!(started.elapsed() >= Duration::from_millis(40), "backoff between attempts");
}

#[tokio::test]
async fn port_freed_during_retries_is_taken() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let policy = BindPolicy::new(20).with_backoff(Duration::from_millis(50));

    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        drop(occupied);
    });

    let listeners = ListenerSet::bind(&["127.0.0.1".to_string()], port, &policy)
        .await
        .unwrap();
    release.await.unwrap();
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners.iter().next().unwrap().local_addr().unwrap().port(), port);
}
