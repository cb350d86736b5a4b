//! Cache group behaviour through the public API

use async_trait::async_trait;
use bytes::Bytes;
use repocache::cache::{loader_fn, CacheGroup, GroupOptions, Loader, Peer, PeerSet};
use repocache::peer::PeerTransport;
use repocache::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Loader that records every resource id and can be held back
struct RecordingLoader {
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
    fail_first: AtomicUsize,
}

impl RecordingLoader {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: None,
            fail_first: AtomicUsize::new(0),
        })
    }

    fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
            fail_first: AtomicUsize::new(0),
        })
    }

    fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            gate: None,
            fail_first: AtomicUsize::new(n),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Loader for RecordingLoader {
    async fn load(&self, resource_id: &str) -> Result<Bytes> {
        self.calls.lock().unwrap().push(resource_id.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Loader("origin returned 503".into()));
        }
        Ok(Bytes::from(format!("repodata:{}", resource_id)))
    }
}

/// Transport that must never be used
struct NoPeers;

#[async_trait]
impl PeerTransport for NoPeers {
    async fn fetch(&self, peer: &Peer, _group: &str, key: &str) -> Result<Bytes> {
        panic!("unexpected forward of {} to {}", key, peer);
    }
}

/// Transport counting calls, optionally failing
struct CountingPeers {
    calls: AtomicUsize,
    gate: Arc<Notify>,
    fail: bool,
}

#[async_trait]
impl PeerTransport for CountingPeers {
    async fn fetch(&self, peer: &Peer, _group: &str, key: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        if self.fail {
            return Err(Error::PeerUnavailable {
                peer: peer.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(Bytes::from(format!("from {}:{}", peer, key)))
    }
}

fn local_group(loader: Arc<dyn Loader>, options: GroupOptions) -> Arc<CacheGroup> {
    Arc::new(CacheGroup::new(
        "repodata",
        PeerSet::local("http://probe-1:7070").unwrap(),
        loader,
        Arc::new(NoPeers),
        options,
    ))
}

fn pair_group(transport: Arc<dyn PeerTransport>, loader: Arc<dyn Loader>) -> Arc<CacheGroup> {
    Arc::new(CacheGroup::new(
        "repodata",
        PeerSet::new(
            ["http://probe-1:7070", "http://probe-2:7070"],
            "http://probe-1:7070",
        )
        .unwrap(),
        loader,
        transport,
        GroupOptions::default(),
    ))
}

fn foreign_key(group: &CacheGroup) -> String {
    (0..)
        .map(|i| format!("http://mirror/x86_64-repodata-{}{{{{1}}}}", i))
        .find(|k| !group.owner_of(k).is_local())
        .unwrap()
}

async fn wait_for_calls(count: impl Fn() -> usize, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while count() < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("calls never arrived");
}

#[tokio::test]
async fn test_concurrent_gets_load_once() {
    let gate = Arc::new(Notify::new());
    let loader = RecordingLoader::gated(gate.clone());
    let group = local_group(loader.clone(), GroupOptions::default());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let group = group.clone();
            tokio::spawn(async move { group.get("x86_64-repodata{{100}}").await })
        })
        .collect();

    wait_for_calls(|| loader.calls().len(), 1).await;
    // let every caller attach before the load completes
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.notify_one();

    for handle in handles {
        assert_eq!(
            handle.await.unwrap().unwrap(),
            Bytes::from("repodata:x86_64-repodata")
        );
    }
    assert_eq!(loader.calls(), vec!["x86_64-repodata"]);
    let stats = group.stats();
    assert_eq!(stats.local_loads, 1);
    assert_eq!(stats.coalesced + stats.hits, 15);
}

#[tokio::test]
async fn test_new_token_is_a_new_entry() {
    let loader = RecordingLoader::new();
    let group = local_group(loader.clone(), GroupOptions::default());

    group.get("R{{1}}").await.unwrap();
    group.get("R{{2}}").await.unwrap();
    group.get("R{{2}}").await.unwrap();

    assert_eq!(loader.calls(), vec!["R", "R"]);
    assert!(group.store().contains("R{{1}}"));
    assert!(group.store().contains("R{{2}}"));
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let loader = RecordingLoader::failing_first(1);
    let group = local_group(loader.clone(), GroupOptions::default());
    group.store().set("other", Bytes::from_static(b"kept"));

    let err = group.get("K{{1}}").await.unwrap_err();
    assert_eq!(err, Error::Loader("origin returned 503".into()));
    assert!(!group.store().contains("K{{1}}"));
    assert!(group.store().contains("other"));

    let value = group.get("K{{1}}").await.unwrap();
    assert_eq!(value, Bytes::from("repodata:K"));
    assert_eq!(loader.calls().len(), 2);
}

#[tokio::test]
async fn test_all_waiters_see_the_same_error() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(CountingPeers {
        calls: AtomicUsize::new(0),
        gate: gate.clone(),
        fail: true,
    });
    let loader = RecordingLoader::new();
    let group = pair_group(transport.clone(), loader.clone());
    let key = foreign_key(&group);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let group = group.clone();
            let key = key.clone();
            tokio::spawn(async move { group.get(&key).await })
        })
        .collect();

    wait_for_calls(|| transport.calls.load(Ordering::SeqCst), 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.notify_one();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            Error::PeerUnavailable {
                peer: "http://probe-2:7070".into(),
                reason: "connection refused".into(),
            }
        );
    }
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(loader.calls().is_empty(), "non-owner must not hit the origin");
    assert!(group.store().is_empty());
}

#[tokio::test]
async fn test_forwarded_value_is_replicated() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(CountingPeers {
        calls: AtomicUsize::new(0),
        gate: gate.clone(),
        fail: false,
    });
    let loader = RecordingLoader::new();
    let group = pair_group(transport.clone(), loader.clone());
    let key = foreign_key(&group);

    gate.notify_one();
    let value = group.get(&key).await.unwrap();
    assert_eq!(value, Bytes::from(format!("from http://probe-2:7070:{}", key)));

    // served from the local replica, no second forward
    assert_eq!(group.get(&key).await.unwrap(), value);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(loader.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_caller_does_not_abort_load() {
    let gate = Arc::new(Notify::new());
    let loader = RecordingLoader::gated(gate.clone());
    let group = local_group(loader.clone(), GroupOptions::default());

    let impatient = tokio::time::timeout(Duration::from_millis(20), group.get("slow{{1}}")).await;
    assert!(impatient.is_err());

    gate.notify_one();
    // the load the cancelled caller started still lands in the store
    tokio::time::timeout(Duration::from_secs(5), async {
        while !group.store().contains("slow{{1}}") {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("load never completed");

    assert_eq!(group.get("slow{{1}}").await.unwrap(), Bytes::from("repodata:slow"));
    assert_eq!(loader.calls().len(), 1);
}

#[tokio::test]
async fn test_zero_capacity_loads_every_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let loader: Arc<dyn Loader> = Arc::new(loader_fn(move |id: String| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(id))
        }
    }));
    let group = local_group(
        loader,
        GroupOptions {
            capacity_bytes: 0,
            ..GroupOptions::default()
        },
    );

    for _ in 0..3 {
        assert_eq!(group.get("R{{1}}").await.unwrap(), Bytes::from("R"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_store_respects_budget_through_group() {
    let loader: Arc<dyn Loader> = Arc::new(loader_fn(|id: String| async move {
        Ok(Bytes::from(vec![b'x'; id.len() * 10]))
    }));
    let group = local_group(
        loader,
        GroupOptions {
            capacity_bytes: 100,
            ..GroupOptions::default()
        },
    );

    for key in ["aaaaaa", "bbbbbb", "ccc"] {
        group.get(key).await.unwrap();
    }
    assert!(!group.store().contains("aaaaaa"));
    assert!(group.store().contains("bbbbbb"));
    assert!(group.store().contains("ccc"));
    assert_eq!(group.store().bytes(), 90);
    assert_eq!(group.stats().evictions, 1);
}
