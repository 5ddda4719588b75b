//! Integration tests for the notification fan-out.
//!
//! A scripted push transport stands in for the push services so each
//! subscription's outcome is fixed up front.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use vh_notify::constants::DEFAULT_TITLE;
use vh_notify::notifications::{
    PushDispatcher, PushOutcome, PushSubscription, PushTransport, SubscriptionStore,
};
use vh_notify::stream::{FrameSender, StreamFrame, StreamRegistry};
use vh_notify::{DeliverySummary, Notification, NotificationRelay};

/// Outcome per endpoint; unknown endpoints fail recoverably.
#[derive(Default)]
struct ScriptedTransport {
    outcomes: HashMap<String, PushOutcome>,
    payloads: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn with(outcomes: &[(&str, PushOutcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(e, o)| (e.to_string(), *o))
                .collect(),
            payloads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn deliver(&self, sub: &PushSubscription, payload: &[u8]) -> Result<PushOutcome> {
        self.payloads
            .lock()
            .expect("payload log")
            .push(String::from_utf8_lossy(payload).into_owned());
        match self.outcomes.get(&sub.endpoint) {
            Some(outcome) => Ok(*outcome),
            None => anyhow::bail!("503 from push service"),
        }
    }
}

fn sub(endpoint: &str) -> PushSubscription {
    PushSubscription::new(endpoint, "p256dh", "auth")
}

struct Harness {
    _dir: TempDir,
    relay: NotificationRelay,
    transport: Arc<ScriptedTransport>,
    store_path: std::path::PathBuf,
}

async fn harness(endpoints: &[&str], outcomes: &[(&str, PushOutcome)]) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let store_path = dir.path().join("subscriptions.json");
    let mut store = SubscriptionStore::load(&store_path);
    for endpoint in endpoints {
        store.add(sub(endpoint)).await.expect("add");
    }

    let transport = Arc::new(ScriptedTransport::with(outcomes));
    let relay = NotificationRelay::new(
        Arc::new(StreamRegistry::new()),
        Arc::new(tokio::sync::Mutex::new(store)),
        PushDispatcher::new(Arc::clone(&transport) as Arc<dyn PushTransport>),
    );

    Harness {
        _dir: dir,
        relay,
        transport,
        store_path,
    }
}

async fn stored_endpoints(relay: &NotificationRelay) -> Vec<String> {
    relay
        .store()
        .lock()
        .await
        .all()
        .iter()
        .map(|s| s.endpoint.clone())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let h = harness(
        &["https://push/A", "https://push/B"],
        &[
            ("https://push/A", PushOutcome::Delivered),
            ("https://push/B", PushOutcome::Gone),
        ],
    )
    .await;
    let mut first = h.relay.streams().connect();
    let mut second = h.relay.streams().connect();

    let summary = h
        .relay
        .submit(Notification::new("T", "M"))
        .await
        .expect("submit");

    assert_eq!(summary, DeliverySummary { sse: 2, push: 1 });
    assert_eq!(stored_endpoints(&h.relay).await, vec!["https://push/A"]);

    for conn in [&mut first, &mut second] {
        let frame = conn.next().await.expect("frame");
        assert_eq!(
            frame.to_wire(),
            "event: notification\ndata: {\"title\":\"T\",\"message\":\"M\"}\n\n"
        );
    }

    // Removal is durable.
    let reloaded = SubscriptionStore::load(&h.store_path);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.all()[0].endpoint, "https://push/A");
}

#[tokio::test]
async fn test_reconciliation_removes_exactly_the_gone_subset() {
    let endpoints = ["https://p/0", "https://p/1", "https://p/2", "https://p/3", "https://p/4"];
    let h = harness(
        &endpoints,
        &[
            ("https://p/0", PushOutcome::Gone),
            ("https://p/1", PushOutcome::Delivered),
            ("https://p/2", PushOutcome::Gone),
            // p/3 fails recoverably and must survive.
            ("https://p/4", PushOutcome::Delivered),
        ],
    )
    .await;

    let summary = h
        .relay
        .submit(Notification::new("x", "y"))
        .await
        .expect("submit");

    assert_eq!(summary.push, 2);
    assert_eq!(summary.sse, 0);
    assert_eq!(
        stored_endpoints(&h.relay).await,
        vec!["https://p/1", "https://p/3", "https://p/4"]
    );
}

/// Holds the `slow` endpoint's answer until released. Every other endpoint
/// is delivered at once.
struct GatedTransport {
    slow: String,
    outcome: PushOutcome,
    started: Notify,
    release: Notify,
}

impl GatedTransport {
    fn new(slow: &str, outcome: PushOutcome) -> Arc<Self> {
        Arc::new(Self {
            slow: slow.to_string(),
            outcome,
            started: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl PushTransport for GatedTransport {
    async fn deliver(&self, sub: &PushSubscription, _payload: &[u8]) -> Result<PushOutcome> {
        if sub.endpoint != self.slow {
            return Ok(PushOutcome::Delivered);
        }
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.outcome)
    }
}

async fn gated_relay(
    dir: &TempDir,
    endpoints: &[&str],
    transport: &Arc<GatedTransport>,
) -> NotificationRelay {
    let mut store = SubscriptionStore::load(dir.path().join("subscriptions.json"));
    for endpoint in endpoints {
        store.add(sub(endpoint)).await.expect("add");
    }
    NotificationRelay::new(
        Arc::new(StreamRegistry::new()),
        Arc::new(tokio::sync::Mutex::new(store)),
        PushDispatcher::new(Arc::clone(transport) as Arc<dyn PushTransport>),
    )
}

#[tokio::test]
async fn test_reconciliation_after_store_changed_mid_dispatch() {
    let dir = TempDir::new().expect("tempdir");
    let transport = GatedTransport::new("https://p/b", PushOutcome::Gone);
    let relay = gated_relay(&dir, &["https://p/a", "https://p/b"], &transport).await;

    let task = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.submit(Notification::new("x", "y")).await })
    };
    transport.started.notified().await;

    // While `b` is in flight: drop `a` (shifting `b` to index 0) and append `c`
    // at `b`'s old index.
    relay
        .store()
        .lock()
        .await
        .remove_many(&BTreeSet::from([0]))
        .await
        .expect("remove");
    relay.add_subscription(sub("https://p/c")).await.expect("add");

    transport.release.notify_one();
    let summary = task.await.expect("join").expect("submit");

    assert_eq!(summary.push, 1);
    assert_eq!(stored_endpoints(&relay).await, vec!["https://p/c"]);
}

#[tokio::test]
async fn test_stream_delivery_does_not_wait_for_push() {
    let dir = TempDir::new().expect("tempdir");
    let transport = GatedTransport::new("https://p/slow", PushOutcome::Delivered);
    let relay = gated_relay(&dir, &["https://p/slow"], &transport).await;
    let mut conn = relay.streams().connect();

    let task = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.submit(Notification::new("T", "M")).await })
    };
    transport.started.notified().await;

    // The push is still held, yet the open page already has the frame.
    let frame = tokio::time::timeout(Duration::from_secs(2), conn.next())
        .await
        .expect("frame arrived while push was in flight")
        .expect("frame");
    assert_eq!(frame.data(), r#"{"title":"T","message":"M"}"#);
    assert!(!task.is_finished());

    transport.release.notify_one();
    let summary = task.await.expect("join").expect("submit");
    assert_eq!(summary, DeliverySummary { sse: 1, push: 1 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connect_and_disconnect_during_broadcasts() {
    let registry = Arc::new(StreamRegistry::new());

    // Each churner opens 100 connections, keeping every tenth one open.
    let churners: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut kept = Vec::new();
                for n in 0..100 {
                    let conn = registry.connect();
                    if n % 10 == 0 {
                        kept.push(conn);
                    }
                    tokio::task::yield_now().await;
                }
                kept
            })
        })
        .collect();

    // Fewer broadcasts than the per-connection buffer, so kept connections
    // are never dropped for falling behind.
    let broadcaster = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for n in 0..50 {
                registry.broadcast(StreamFrame::new("notification", n.to_string()));
                tokio::task::yield_now().await;
            }
        })
    };

    let mut kept = Vec::new();
    for churner in churners {
        kept.extend(churner.await.expect("churner"));
    }
    broadcaster.await.expect("broadcaster");

    assert_eq!(kept.len(), 40);
    assert_eq!(registry.len(), kept.len());
    assert_eq!(
        registry.broadcast(StreamFrame::new("notification", "last")),
        kept.len()
    );

    drop(kept);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_register_with_caller_owned_channel() {
    let registry = StreamRegistry::new();
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let sender: FrameSender = tx;

    let id = registry.register(sender);
    assert_eq!(registry.broadcast(StreamFrame::new("notification", "hi")), 1);
    assert_eq!(rx.recv().await.expect("frame").data(), "hi");

    assert!(registry.unregister(id));
    assert_eq!(registry.broadcast(StreamFrame::new("notification", "bye")), 0);
}

#[tokio::test]
async fn test_broadcast_completeness() {
    let h = harness(&[], &[]).await;
    let connections: Vec<_> = (0..7).map(|_| h.relay.streams().connect()).collect();

    let summary = h
        .relay
        .submit(Notification::new("x", "y"))
        .await
        .expect("submit");

    assert_eq!(summary.sse, connections.len());
}

#[tokio::test]
async fn test_empty_notification_uses_defaults() {
    let h = harness(
        &["https://push/A"],
        &[("https://push/A", PushOutcome::Delivered)],
    )
    .await;
    let mut conn = h.relay.streams().connect();

    let summary = h
        .relay
        .submit(Notification::default())
        .await
        .expect("submit");
    assert_eq!(summary, DeliverySummary { sse: 1, push: 1 });

    let expected = format!(r#"{{"title":"{DEFAULT_TITLE}","message":""}}"#);
    let frame = conn.next().await.expect("frame");
    assert_eq!(frame.data(), expected);
    assert_eq!(*h.transport.payloads.lock().expect("payloads"), vec![expected]);
}

#[tokio::test]
async fn test_no_receivers_is_not_an_error() {
    let h = harness(&[], &[]).await;
    let summary = h
        .relay
        .submit(Notification::new("x", "y"))
        .await
        .expect("submit");
    assert_eq!(summary, DeliverySummary::default());
}

#[tokio::test]
async fn test_disconnected_stream_is_not_counted() {
    let h = harness(&[], &[]).await;
    let _kept = h.relay.streams().connect();
    let dropped = h.relay.streams().connect();
    drop(dropped);

    let summary = h
        .relay
        .submit(Notification::new("x", "y"))
        .await
        .expect("submit");
    assert_eq!(summary.sse, 1);
}
