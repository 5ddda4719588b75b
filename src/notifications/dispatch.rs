//! Concurrent push fan-out with per-subscription outcome capture.

use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::push::{PushOutcome, PushSubscription, PushTransport};

/// Aggregated result of one [`PushDispatcher::dispatch_all`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Deliveries the push service accepted.
    pub delivered: usize,
    /// Positions (in the dispatched slice) whose subscription is gone for good.
    pub gone: BTreeSet<usize>,
}

/// Sends a payload to every subscription through a [`PushTransport`].
///
/// Stateless apart from the transport: it never touches the subscription
/// store. Removing gone subscriptions is the caller's job.
#[derive(Clone)]
pub struct PushDispatcher {
    transport: Arc<dyn PushTransport>,
}

impl std::fmt::Debug for PushDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushDispatcher").finish_non_exhaustive()
    }
}

impl PushDispatcher {
    /// Create a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    /// Deliver `payload` to every subscription concurrently.
    ///
    /// All attempts run to completion before this returns; one failure never
    /// cancels or hides another. Recoverable failures are logged and leave the
    /// subscription eligible for the next notification.
    pub async fn dispatch_all(
        &self,
        payload: &[u8],
        subscriptions: &[PushSubscription],
    ) -> DispatchReport {
        if subscriptions.is_empty() {
            return DispatchReport::default();
        }

        let attempts = subscriptions
            .iter()
            .map(|sub| self.transport.deliver(sub, payload));
        let outcomes = join_all(attempts).await;

        let mut report = DispatchReport::default();
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(PushOutcome::Delivered) => report.delivered += 1,
                Ok(PushOutcome::Gone) => {
                    report.gone.insert(idx);
                }
                Err(e) => log::warn!("[WebPush] Push failed for sub {idx}: {e:#}"),
            }
        }

        report
    }
}
