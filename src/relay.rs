//! Notification fan-out.
//!
//! [`NotificationRelay`] is the single entry point for a submitted
//! notification. It writes the SSE frame and runs the push dispatch at the
//! same time, waits for both, then drops every subscription the push
//! services reported as gone.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::constants::{DEFAULT_TITLE, NOTIFICATION_EVENT};
use crate::notifications::{PushDispatcher, PushSubscription, SubscriptionStore};
use crate::stream::{StreamFrame, StreamRegistry};

/// A notification as submitted by the sender.
///
/// Absent fields take their defaults; an empty title is also replaced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title.
    #[serde(default)]
    pub title: String,
    /// Notification body.
    #[serde(default)]
    pub message: String,
}

impl Notification {
    /// Create a notification; defaults are applied on dispatch.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    /// Apply the placeholder title if none was given.
    pub fn with_defaults(mut self) -> Self {
        if self.title.is_empty() {
            self.title = DEFAULT_TITLE.to_string();
        }
        self
    }
}

/// Per-submission result reported back to the sender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    /// Live stream connections written to.
    pub sse: usize,
    /// Push deliveries the push services accepted.
    pub push: usize,
}

/// Shared handle to the subscription store.
///
/// An async mutex: it stays held while a mutation is written to disk.
pub type SharedStore = Arc<Mutex<SubscriptionStore>>;

/// Coordinates delivery over both channels.
#[derive(Debug, Clone)]
pub struct NotificationRelay {
    streams: Arc<StreamRegistry>,
    store: SharedStore,
    dispatcher: PushDispatcher,
}

impl NotificationRelay {
    /// Wire the relay to its collaborators.
    pub fn new(streams: Arc<StreamRegistry>, store: SharedStore, dispatcher: PushDispatcher) -> Self {
        Self {
            streams,
            store,
            dispatcher,
        }
    }

    /// Live stream registry.
    pub fn streams(&self) -> &Arc<StreamRegistry> {
        &self.streams
    }

    /// Subscription store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    async fn lock_store(&self) -> MutexGuard<'_, SubscriptionStore> {
        self.store.lock().await
    }

    /// Store a push subscription, deduplicated by endpoint.
    ///
    /// Returns `Ok(false)` if the endpoint was already known.
    pub async fn add_subscription(&self, subscription: PushSubscription) -> Result<bool> {
        self.lock_store().await.add(subscription).await
    }

    /// Number of stored push subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.lock_store().await.len()
    }

    /// Deliver `notification` to every live stream and push subscription.
    ///
    /// Both channels are in flight together. Once every push attempt has
    /// settled, gone subscriptions are removed from the store in a single
    /// call. Reaching nobody is not an error.
    pub async fn submit(&self, notification: Notification) -> Result<DeliverySummary> {
        let notification = notification.with_defaults();
        let payload =
            serde_json::to_string(&notification).context("Failed to serialize notification")?;

        let snapshot = self.lock_store().await.all().to_vec();
        let frame = StreamFrame::new(NOTIFICATION_EVENT, payload.clone());

        let (sse, report) = tokio::join!(
            async { self.streams.broadcast(frame) },
            self.dispatcher.dispatch_all(payload.as_bytes(), &snapshot),
        );

        if !report.gone.is_empty() {
            self.reconcile(&snapshot, &report.gone).await;
        }

        let summary = DeliverySummary {
            sse,
            push: report.delivered,
        };
        log::info!(
            "[Relay] Notification sent - SSE: {}, Push: {} - [{}] {}",
            summary.sse,
            summary.push,
            notification.title,
            notification.message
        );
        Ok(summary)
    }

    /// Drop the subscriptions at `gone` (positions in `snapshot`).
    ///
    /// Positions are resolved through their endpoints so a store that changed
    /// since the snapshot is still pruned correctly.
    async fn reconcile(&self, snapshot: &[PushSubscription], gone: &BTreeSet<usize>) {
        let endpoints = gone
            .iter()
            .filter_map(|&idx| snapshot.get(idx))
            .map(|s| s.endpoint.as_str());

        let mut store = self.lock_store().await;
        let indices = store.indices_of(endpoints);
        match store.remove_many(&indices).await {
            Ok(removed) => {
                log::info!("[Relay] Removed {removed} expired push subscription(s)");
            }
            Err(e) => {
                log::warn!("[Relay] Failed to persist subscription removal: {e:#}");
            }
        }
    }
}
