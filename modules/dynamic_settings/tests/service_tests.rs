//! Integration tests for the dynamic settings service

use dynamic_settings::api::native::NativeClient;
use dynamic_settings::contract::*;
use dynamic_settings::domain::Service;
use dynamic_settings::infra::storage::InMemorySettingsStore;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{eventually, CountingStore};

struct Fixture {
    raw: Arc<InMemorySettingsStore>,
    store: Arc<CountingStore>,
    service: Arc<Service>,
}

fn fixture(entries: &[(&str, &str)]) -> Fixture {
    let raw = Arc::new(InMemorySettingsStore::with_entries(entries.iter().copied()));
    let store = Arc::new(CountingStore::new(raw.clone()));
    let service = Arc::new(Service::new(store.clone()));
    Fixture {
        raw,
        store,
        service,
    }
}

// ===== Cache Population =====

#[tokio::test]
async fn test_first_read_populates_cache_and_later_reads_hit() {
    let f = fixture(&[("avatar.default_size", "80")]);

    assert_eq!(f.service.get_string("avatar.default_size").await.unwrap(), "80");
    assert_eq!(f.store.gets(), 1);
    assert!(f.service.is_cached("avatar.default_size"));

    let reads = (0..100).map(|_| {
        let service = f.service.clone();
        tokio::spawn(async move { service.get_string("avatar.default_size").await })
    });
    for read in futures::future::join_all(reads).await {
        assert_eq!(read.unwrap().unwrap(), "80");
    }

    assert_eq!(f.store.gets(), 1);
    assert_eq!(f.service.active_watches(), 1);
}

#[tokio::test]
async fn test_concurrent_misses_fetch_and_watch_once() {
    let f = fixture(&[("proxy.upstream", "https://www.gravatar.com/avatar/")]);
    f.store.set_get_delay(Duration::from_millis(30));

    let reads = (0..50).map(|_| {
        let service = f.service.clone();
        tokio::spawn(async move { service.get_string("proxy.upstream").await })
    });
    for read in futures::future::join_all(reads).await {
        assert_eq!(read.unwrap().unwrap(), "https://www.gravatar.com/avatar/");
    }

    assert_eq!(f.store.gets(), 1);
    assert_eq!(f.store.watches(), 1);
    assert_eq!(f.raw.watcher_count("proxy.upstream"), 1);
    assert_eq!(f.service.active_watches(), 1);
}

#[tokio::test]
async fn test_watch_outlives_the_populating_call() {
    let f = fixture(&[("k", "v")]);

    let service = f.service.clone();
    tokio::spawn(async move { service.get_string("k").await })
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(f.service.is_cached("k"));
    assert_eq!(f.raw.watcher_count("k"), 1);
}

#[tokio::test]
async fn test_cancelled_lookup_leaves_no_entry() {
    let f = fixture(&[("k", "v")]);
    f.store.set_get_delay(Duration::from_millis(200));

    let service = f.service.clone();
    let lookup = tokio::spawn(async move { service.get_string("k").await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    lookup.abort();
    assert!(lookup.await.unwrap_err().is_cancelled());

    assert!(!f.service.is_cached("k"));
    assert_eq!(f.service.active_watches(), 0);

    f.store.set_get_delay(Duration::from_millis(1));
    assert_eq!(f.service.get_string("k").await.unwrap(), "v");
    assert_eq!(f.service.active_watches(), 1);
}

// ===== Watch Propagation =====

#[tokio::test]
async fn test_write_propagates_through_watch() {
    let f = fixture(&[("k", "v1")]);
    assert_eq!(f.service.get_string("k").await.unwrap(), "v1");

    f.service.save_string("k", "v2").await.unwrap();
    assert_eq!(f.store.puts(), 1);

    eventually(|| f.raw.revision() == 2).await;
    let service = f.service.clone();
    let mut latest = String::new();
    for _ in 0..200 {
        latest = service.get_string("k").await.unwrap();
        if latest == "v2" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(latest, "v2");
    assert_eq!(f.store.gets(), 1);
}

#[tokio::test]
async fn test_save_without_watch_reads_through() {
    let f = fixture(&[]);

    f.service.save_string("never.read", "fresh").await.unwrap();
    assert!(!f.service.is_cached("never.read"));

    assert_eq!(f.service.get_string("never.read").await.unwrap(), "fresh");
    assert_eq!(f.store.gets(), 1);
}

#[tokio::test]
async fn test_delete_event_forces_refetch() {
    let f = fixture(&[("k", "v")]);
    f.service.get_string("k").await.unwrap();

    f.raw.delete("k").unwrap();
    eventually(|| !f.service.is_cached("k")).await;

    let err = f.service.get_string("k").await.unwrap_err();
    assert_eq!(err, SettingsError::NotFound { key: "k".to_string() });
    assert_eq!(f.store.gets(), 2);
}

#[tokio::test]
async fn test_unrecognized_event_is_ignored() {
    let f = fixture(&[("k", "v")]);
    f.service.get_string("k").await.unwrap();

    f.raw.emit(
        "k",
        WatchEvent::Unrecognized {
            kind: "compact".to_string(),
            revision: 99,
        },
    );
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(f.service.get_string("k").await.unwrap(), "v");
    assert_eq!(f.service.active_watches(), 1);
    assert_eq!(f.store.gets(), 1);
}

// ===== Watch Teardown =====

#[tokio::test]
async fn test_closed_watch_forces_refetch_and_rearm() {
    let f = fixture(&[("k", "v")]);
    f.service.get_string("k").await.unwrap();
    assert_eq!(f.store.watches(), 1);

    assert_eq!(f.raw.close_watches("k"), 1);
    eventually(|| !f.service.is_cached("k")).await;
    assert_eq!(f.service.active_watches(), 0);

    assert_eq!(f.service.get_string("k").await.unwrap(), "v");
    assert_eq!(f.store.gets(), 2);
    assert_eq!(f.store.watches(), 2);
    assert_eq!(f.service.active_watches(), 1);
}

#[tokio::test]
async fn test_watch_error_is_contained() {
    let f = fixture(&[("k", "v")]);
    f.service.get_string("k").await.unwrap();

    f.raw.fail_watches("k", "lease expired");
    eventually(|| !f.service.is_cached("k")).await;

    // The failure never reaches callers; the next read simply refetches
    assert_eq!(f.service.get_string("k").await.unwrap(), "v");
    assert_eq!(f.store.gets(), 2);
}

#[tokio::test]
async fn test_failed_watch_open_serves_value_uncached() {
    let f = fixture(&[("k", "v")]);
    f.store.set_fail_watch_open(true);

    assert_eq!(f.service.get_string("k").await.unwrap(), "v");
    assert!(!f.service.is_cached("k"));
    assert_eq!(f.service.active_watches(), 0);

    f.store.set_fail_watch_open(false);
    assert_eq!(f.service.get_string("k").await.unwrap(), "v");
    assert_eq!(f.store.gets(), 2);
    assert!(f.service.is_cached("k"));
}

#[tokio::test]
async fn test_shutdown_stops_watches() {
    let f = fixture(&[("a", "1"), ("b", "2")]);
    f.service.get_string("a").await.unwrap();
    f.service.get_string("b").await.unwrap();
    assert_eq!(f.service.active_watches(), 2);

    assert!(f.service.shutdown(Duration::from_secs(1)).await);
    assert_eq!(f.service.active_watches(), 0);
    assert!(f.service.cached_keys().is_empty());
    eventually(|| f.raw.watcher_count("a") == 0 && f.raw.watcher_count("b") == 0).await;
}

// ===== Errors =====

#[tokio::test]
async fn test_absent_key_is_not_found_and_not_cached() {
    let f = fixture(&[]);

    let err = f.service.get_string("missing").await.unwrap_err();
    assert_eq!(
        err,
        SettingsError::NotFound {
            key: "missing".to_string()
        }
    );
    assert!(!f.service.is_cached("missing"));
    assert_eq!(f.store.watches(), 0);

    assert!(f.service.get_string("missing").await.unwrap_err().is_not_found());
    assert_eq!(f.store.gets(), 2);
}

#[tokio::test]
async fn test_parse_error_is_distinct() {
    let f = fixture(&[("avatar.max_size", "abc")]);

    let err = f.service.get_int64("avatar.max_size").await.unwrap_err();
    match &err {
        SettingsError::Parse { key, expected, .. } => {
            assert_eq!(key, "avatar.max_size");
            assert_eq!(*expected, "int64");
        }
        other => panic!("Expected Parse error, got {:?}", other),
    }
    assert!(!err.is_not_found());
    assert!(!err.is_unavailable());

    // The raw value is still cached and watched
    assert!(f.service.is_cached("avatar.max_size"));
}

#[tokio::test]
async fn test_store_outage_is_unavailable() {
    let f = fixture(&[("k", "12")]);
    f.raw.set_available(false);

    let err = f.service.get_int64("k").await.unwrap_err();
    assert!(err.is_unavailable(), "got {:?}", err);
    assert_eq!(err.key(), "k");

    let err = f.service.save_string("k", "13").await.unwrap_err();
    assert!(err.is_unavailable());

    f.raw.set_available(true);
    assert_eq!(f.service.get_int64("k").await.unwrap(), 12);
}

#[tokio::test]
async fn test_request_timeout_is_unavailable() {
    let raw = Arc::new(InMemorySettingsStore::with_entries([("k", "v")]));
    let store = Arc::new(CountingStore::new(raw));
    store.set_get_delay(Duration::from_millis(500));
    let service = Service::new(store).with_request_timeout(Duration::from_millis(20));

    let err = service.get_string("k").await.unwrap_err();
    assert!(err.is_unavailable());
    assert!(err.to_string().contains("timed out"));
    assert!(!service.is_cached("k"));
}

// ===== Batch Lookup =====

#[tokio::test]
async fn test_list_strings() {
    let f = fixture(&[("a", "1"), ("b", "2")]);

    let values = f.service.list_strings(&["a", "b"]).await.unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values["a"], "1");
    assert_eq!(values["b"], "2");
}

#[tokio::test]
async fn test_list_strings_partial_failure_keeps_cached_entries() {
    let f = fixture(&[("k1", "one"), ("k3", "three")]);

    let err = f.service.list_strings(&["k1", "k2", "k3"]).await.unwrap_err();
    assert_eq!(err, SettingsError::NotFound { key: "k2".to_string() });
    assert!(err.to_string().contains("k2"));

    // k3 was never reached
    assert!(!f.service.is_cached("k3"));
    assert_eq!(f.store.gets(), 2);

    assert_eq!(f.service.get_string("k1").await.unwrap(), "one");
    assert_eq!(f.store.gets(), 2);
}

// ===== Typed Accessors through the native client =====

#[tokio::test]
async fn test_typed_accessors() {
    let f = fixture(&[
        ("cache.ttl", "1h30m"),
        ("cache.grace", "PT30S"),
        ("qq.enabled", "true"),
        ("avatar.max_size", "2048"),
        ("avatar.offset", "-3"),
        ("proxy.upstream", "https://www.gravatar.com/avatar/"),
    ]);
    let client: Arc<dyn SettingsApi> = Arc::new(NativeClient::new(f.service.clone()));

    assert_eq!(
        client.get_duration("cache.ttl").await.unwrap(),
        Duration::from_secs(5_400)
    );
    assert_eq!(
        client.get_duration("cache.grace").await.unwrap(),
        Duration::from_secs(30)
    );
    assert!(client.get_bool("qq.enabled").await.unwrap());
    assert_eq!(client.get_uint64("avatar.max_size").await.unwrap(), 2048);
    assert_eq!(client.get_int64("avatar.offset").await.unwrap(), -3);
    assert!(client.get_uint64("avatar.offset").await.unwrap_err().is_parse());

    let url = client.get_url("proxy.upstream").await.unwrap();
    assert_eq!(url.host_str(), Some("www.gravatar.com"));

    assert!(client.get_bool("avatar.max_size").await.unwrap_err().is_parse());
    assert!(client.get_url("missing").await.unwrap_err().is_not_found());

    client.save_string("qq.enabled", "false").await.unwrap();
    eventually(|| f.raw.revision() == 7).await;
    let mut enabled = true;
    for _ in 0..200 {
        enabled = client.get_bool("qq.enabled").await.unwrap();
        if !enabled {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!enabled);
}
