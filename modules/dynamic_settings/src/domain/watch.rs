//! Background watches that keep cached settings in sync with the store
//!
//! Each cached key has exactly one registered watch task. The task applies
//! change events to the cache until its stream ends, then evicts the entry so
//! the next read goes back to the store instead of serving a value nobody is
//! watching any more.
//!
//! Watch tasks are spawned detached from the request that populated the key.
//! Their cancellation tokens derive from the supervisor's root token, which is
//! cancelled only by [`WatchSupervisor::shutdown`] or when the supervisor is
//! dropped.

use super::cache::{CacheLayer, KeyLocks};
use super::repository::WatchStream;
use crate::contract::{Revision, WatchEvent};
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Registry entry for the live watch of one key
#[derive(Debug)]
struct WatchHandle {
    generation: u64,
    cancel: CancellationToken,
}

/// Owns the per-key watch tasks and their registry
pub struct WatchSupervisor {
    cache: Arc<CacheLayer>,
    locks: Arc<KeyLocks>,
    registry: Arc<DashMap<String, WatchHandle>>,
    root: CancellationToken,
    tracker: TaskTracker,
    next_generation: AtomicU64,
}

impl WatchSupervisor {
    pub fn new(cache: Arc<CacheLayer>, locks: Arc<KeyLocks>) -> Self {
        Self {
            cache,
            locks,
            registry: Arc::new(DashMap::new()),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Start keeping `key` in sync using `stream`, which must have been opened
    /// after revision `revision`.
    ///
    /// The caller holds the key's population lock. Any watch previously
    /// registered for the key is cancelled and will not touch the cache when
    /// it exits. Returns the generation of the new watch.
    pub fn arm(&self, key: &str, revision: Revision, stream: WatchStream) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = self.root.child_token();

        let previous = self.registry.insert(
            key.to_string(),
            WatchHandle {
                generation,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!(
                key,
                superseded = previous.generation,
                generation,
                "Replacing existing settings watch"
            );
            previous.cancel.cancel();
        }

        let task = WatchTask {
            key: key.to_string(),
            generation,
            last_revision: revision,
            cache: self.cache.clone(),
            locks: self.locks.clone(),
            registry: self.registry.clone(),
            cancel,
        };
        self.tracker.spawn(task.run(stream));

        debug!(key, generation, revision, "Settings watch armed");
        generation
    }

    /// Whether a watch is currently registered for `key`
    pub fn is_watching(&self, key: &str) -> bool {
        self.registry.contains_key(key)
    }

    /// Number of registered watches
    pub fn active_watches(&self) -> usize {
        self.registry.len()
    }

    /// Stop every watch task and wait for them to finish.
    ///
    /// Returns `false` if some tasks were still running when `timeout`
    /// elapsed.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        info!(
            active = self.registry.len(),
            "Shutting down settings watches"
        );
        self.root.cancel();
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "Settings watches did not stop within {:?}", timeout
                );
                false
            }
        }
    }
}

impl Drop for WatchSupervisor {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// State of one running watch
struct WatchTask {
    key: String,
    generation: u64,
    last_revision: Revision,
    cache: Arc<CacheLayer>,
    locks: Arc<KeyLocks>,
    registry: Arc<DashMap<String, WatchHandle>>,
    cancel: CancellationToken,
}

impl WatchTask {
    async fn run(mut self, mut stream: WatchStream) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(key = %self.key, generation = self.generation, "Settings watch cancelled");
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.apply(event).await,
                    Some(Err(e)) => {
                        error!(key = %self.key, error = %e, "Settings watch failed");
                        break;
                    }
                    None => {
                        debug!(key = %self.key, generation = self.generation, "Settings watch closed");
                        break;
                    }
                },
            }
        }

        drop(stream);
        self.teardown().await;
    }

    async fn apply(&mut self, event: WatchEvent) {
        // Serialized with population so a superseded watch cannot overwrite
        // the value stored by its replacement.
        let _guard = self.locks.lock(&self.key).await;
        if self.cancel.is_cancelled() {
            return;
        }

        let revision = event.revision();
        if revision <= self.last_revision {
            debug!(
                key = %self.key,
                revision,
                last_revision = self.last_revision,
                "Skipping stale settings event"
            );
            return;
        }
        self.last_revision = revision;

        match event {
            WatchEvent::Put { value, .. } => {
                debug!(key = %self.key, revision, "Setting changed");
                self.cache.store(&self.key, value);
            }
            WatchEvent::Delete { .. } => {
                debug!(key = %self.key, revision, "Setting deleted");
                self.cache.delete(&self.key);
            }
            WatchEvent::Unrecognized { kind, .. } => {
                warn!(key = %self.key, kind = %kind, revision, "Unknown settings event type");
            }
        }
    }

    async fn teardown(self) {
        let _guard = self.locks.lock(&self.key).await;
        let generation = self.generation;
        let owned = self
            .registry
            .remove_if(&self.key, |_, handle| handle.generation == generation)
            .is_some();

        if owned {
            self.cache.delete(&self.key);
            debug!(key = %self.key, generation, "Evicted setting after watch ended");
        }
    }
}
