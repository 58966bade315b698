//! In-memory watchable settings store
//!
//! Behaves like a single-node revisioned key-value store: every write bumps a
//! store-wide revision and watchers get the events of their key in write
//! order. Deleted keys keep no state behind. Used in development and tests;
//! production wiring plugs a remote client in behind the same trait.

use crate::contract::{KeyValue, Revision, WatchEvent};
use crate::domain::repository::{SettingsStore, StoreError, WatchStream};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type EventSender = mpsc::UnboundedSender<Result<WatchEvent, StoreError>>;

#[derive(Default)]
struct Inner {
    revision: Revision,
    entries: HashMap<String, KeyValue>,
    watchers: HashMap<String, Vec<EventSender>>,
    outage: Option<String>,
}

impl Inner {
    fn check_available(&self) -> Result<(), StoreError> {
        match &self.outage {
            Some(reason) => Err(StoreError::unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn notify(&mut self, key: &str, event: WatchEvent) {
        if let Some(senders) = self.watchers.get_mut(key) {
            senders.retain(|tx| tx.send(Ok(event.clone())).is_ok());
            if senders.is_empty() {
                self.watchers.remove(key);
            }
        }
    }
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    inner: Mutex<Inner>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`, written in iteration order
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for (key, value) in entries {
                inner.revision += 1;
                let revision = inner.revision;
                inner
                    .entries
                    .insert(key.into(), KeyValue::new(value, revision));
            }
        }
        store
    }

    /// Remove a key, notifying its watchers. Returns the delete revision, or
    /// `None` if the key did not exist.
    pub fn delete(&self, key: &str) -> Result<Option<Revision>, StoreError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        if inner.entries.remove(key).is_none() {
            return Ok(None);
        }
        inner.revision += 1;
        let revision = inner.revision;
        inner.notify(key, WatchEvent::Delete { revision });
        Ok(Some(revision))
    }

    /// Deliver an arbitrary event to the watchers of `key` without changing
    /// stored data
    pub fn emit(&self, key: &str, event: WatchEvent) {
        self.inner.lock().notify(key, event);
    }

    /// End every watch on `key` as if the remote had closed them.
    /// Returns the number of watches closed.
    pub fn close_watches(&self, key: &str) -> usize {
        self.inner
            .lock()
            .watchers
            .remove(key)
            .map_or(0, |senders| senders.len())
    }

    /// Fail every watch on `key` with `message`, then close them
    pub fn fail_watches(&self, key: &str, message: &str) -> usize {
        let senders = self.inner.lock().watchers.remove(key).unwrap_or_default();
        for tx in &senders {
            let _ = tx.send(Err(StoreError::watch(message)));
        }
        senders.len()
    }

    /// Simulate an outage: while unavailable every request fails
    pub fn set_available(&self, available: bool) {
        self.inner.lock().outage = if available {
            None
        } else {
            Some("connection refused".to_string())
        };
    }

    /// Watches on `key` whose receiving side is still open
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .watchers
            .get(key)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Current store-wide revision
    pub fn revision(&self) -> Revision {
        self.inner.lock().revision
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, StoreError> {
        let inner = self.inner.lock();
        inner.check_available()?;
        Ok(inner.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<Revision, StoreError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;
        inner.revision += 1;
        let revision = inner.revision;
        inner
            .entries
            .insert(key.to_string(), KeyValue::new(value, revision));
        inner.notify(
            key,
            WatchEvent::Put {
                value: value.to_string(),
                revision,
            },
        );
        Ok(revision)
    }

    async fn watch(&self, key: &str, after: Revision) -> Result<WatchStream, StoreError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        let (tx, rx) = mpsc::unbounded_channel();

        // Catch up on a change that happened between the caller's read and
        // now. A key that is gone is reported at the current revision, since
        // the revision of its delete is not kept.
        let catch_up = match inner.entries.get(key) {
            Some(kv) if kv.revision > after => Some(WatchEvent::Put {
                value: kv.value.clone(),
                revision: kv.revision,
            }),
            None if after > 0 && inner.revision > after => Some(WatchEvent::Delete {
                revision: inner.revision,
            }),
            _ => None,
        };
        if let Some(event) = catch_up {
            let _ = tx.send(Ok(event));
        }

        let senders = inner.watchers.entry(key.to_string()).or_default();
        senders.retain(|sender| !sender.is_closed());
        senders.push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
