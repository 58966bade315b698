//! Common test utilities: a call-counting store double and polling helpers

#![allow(dead_code)]

use async_trait::async_trait;
use dynamic_settings::domain::repository::{SettingsStore, StoreError, WatchStream};
use dynamic_settings::infra::storage::InMemorySettingsStore;
use dynamic_settings::{KeyValue, Revision};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps the in-memory store, counting calls and optionally slowing or
/// failing them
pub struct CountingStore {
    inner: Arc<InMemorySettingsStore>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    watches: AtomicUsize,
    get_delay: Mutex<Option<Duration>>,
    fail_watch_open: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: Arc<InMemorySettingsStore>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            watches: AtomicUsize::new(0),
            get_delay: Mutex::new(None),
            fail_watch_open: AtomicBool::new(false),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }

    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock() = Some(delay);
    }

    pub fn set_fail_watch_open(&self, fail: bool) {
        self.fail_watch_open.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let delay = *self.get_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<Revision, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }

    async fn watch(&self, key: &str, after: Revision) -> Result<WatchStream, StoreError> {
        self.watches.fetch_add(1, Ordering::SeqCst);
        if self.fail_watch_open.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("watch rejected"));
        }
        self.inner.watch(key, after).await
    }
}

/// Poll `condition` until it holds, failing the test after one second
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
