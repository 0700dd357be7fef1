//! Single-shot modes driven through `ModeDispatcher`.

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use pkg_cacher::config::{ConfigStore, Overrides};
use pkg_cacher::{Mode, ModeDispatcher};

mod common;

fn store(dir: &std::path::Path, extra: &str) -> Arc<ConfigStore> {
    let path = common::write_config(dir, extra);
    Arc::new(ConfigStore::load(path, Overrides::new()).unwrap())
}

#[test]
fn retired_cgi_never_reaches_the_handler() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path(), "cgi_advise_to_use = http://cache:3142/\n");
    let handler = common::CountingHandler::default();
    let calls = Arc::clone(&handler.calls);

    ModeDispatcher::new(Mode::Cgi, store, handler).run().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("log/access.log").exists());
}

#[test]
fn cgi_request_is_handled_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path(), "");
    let handler = common::CountingHandler::default();
    let calls = Arc::clone(&handler.calls);

    ModeDispatcher::new(Mode::Cgi, store, handler).run().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let access = fs::read_to_string(dir.path().join("log/access.log")).unwrap();
    assert_eq!(access.lines().count(), 1);
    assert!(access.trim_end().ends_with("|MISS|0|cgi/counted"), "{access}");
}

#[test]
fn inetd_connection_is_handled_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path(), "");
    let handler = common::CountingHandler::default();
    let calls = Arc::clone(&handler.calls);

    ModeDispatcher::new(Mode::Inetd, store, handler).run().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let access = fs::read_to_string(dir.path().join("log/access.log")).unwrap();
    assert_eq!(access.lines().count(), 1);
    assert!(access.trim_end().ends_with("|MISS|0|inetd/counted"), "{access}");
}
