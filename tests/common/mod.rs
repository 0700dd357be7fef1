//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use pkg_cacher::config::{ConfigStore, Overrides};
use pkg_cacher::http::{CacheStatus, HandlerContext, HandlerError, RequestHandler};
use pkg_cacher::net::{BindPolicy, Connection, ListenerSet};
use pkg_cacher::{DaemonContext, Mode};

/// Write a config file under `dir` pointing the cache and logs into it.
pub fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let cache = dir.join("cache");
    let logs = dir.join("log");
    fs::create_dir_all(&cache).unwrap();
    fs::create_dir_all(&logs).unwrap();

    let path = dir.join("pkg-cacher.conf");
    fs::write(
        &path,
        format!(
            "cache_dir = {}\nlogdir = {}\n{extra}",
            cache.display(),
            logs.display()
        ),
    )
    .unwrap();
    path
}

/// A standalone context with its log channel open under `dir/log`.
pub fn context(dir: &Path, extra: &str) -> DaemonContext {
    let path = write_config(dir, extra);
    let store = Arc::new(ConfigStore::load(path, Overrides::new()).unwrap());
    let ctx = DaemonContext::new(Mode::Standalone, store);
    ctx.logs().open(&dir.join("log")).unwrap();
    ctx
}

/// Bind `count` loopback endpoints on ephemeral ports.
pub async fn loopback_listeners(count: usize) -> ListenerSet {
    let addresses = vec!["127.0.0.1".to_string(); count];
    ListenerSet::bind(&addresses, 0, &BindPolicy::new(1)).await.unwrap()
}

/// Send a GET for `path` and read until the server closes.
pub async fn fetch(addr: SocketAddr, path: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
        .await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Panics on its first connection, answers `served` afterwards.
#[derive(Default)]
pub struct PanicOnceHandler {
    calls: AtomicUsize,
}

impl RequestHandler for PanicOnceHandler {
    fn handle(&self, conn: Connection, _ctx: HandlerContext) -> BoxFuture<'_, Result<(), HandlerError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            let (_reader, mut writer) = conn.into_split();
            if call == 0 {
                panic!("handler blew up");
            }
            writer.write_all(b"served\n").await?;
            writer.flush().await?;
            Ok(())
        }
        .boxed()
    }
}

/// Holds every connection open until terminated.
#[derive(Default)]
pub struct HoldHandler {
    pub started: AtomicUsize,
}

impl RequestHandler for HoldHandler {
    fn handle(&self, conn: Connection, _ctx: HandlerContext) -> BoxFuture<'_, Result<(), HandlerError>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        async move {
            let _conn = conn;
            std::future::pending::<()>().await;
            Ok(())
        }
        .boxed()
    }
}

/// Counts invocations and records one access line per call.
#[derive(Default, Clone)]
pub struct CountingHandler {
    pub calls: Arc<AtomicUsize>,
}

impl RequestHandler for CountingHandler {
    fn handle(&self, _conn: Connection, ctx: HandlerContext) -> BoxFuture<'_, Result<(), HandlerError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            ctx.logs()
                .write_access(CacheStatus::Miss, &format!("{}/counted", ctx.mode()), 0, ctx.client())?;
            Ok(())
        }
        .boxed()
    }
}
