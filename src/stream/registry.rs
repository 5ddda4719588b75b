//! Registry of open SSE connections.
//!
//! Connections are anonymous. The registry holds only the sending half of
//! each connection's frame channel, keyed by a monotonically increasing
//! [`ConnectionId`], so iteration order is registration order.

use futures_util::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::StreamFrame;
use crate::constants::STREAM_BUFFER;

/// Identity of one registered connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

/// Sending half of a connection's frame channel, as held by the registry.
pub type FrameSender = mpsc::Sender<Arc<StreamFrame>>;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    connections: BTreeMap<ConnectionId, FrameSender>,
}

/// Set of currently open stream connections.
///
/// Safe to share between request handlers; the lock is never held across an
/// await point.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    inner: Mutex<Inner>,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the sending half of a connection.
    pub fn register(&self, sender: FrameSender) -> ConnectionId {
        let mut inner = self.lock();
        let id = ConnectionId(inner.next_id);
        inner.next_id += 1;
        inner.connections.insert(id, sender);
        id
    }

    /// Open a new connection.
    ///
    /// The returned [`StreamConnection`] yields broadcast frames and removes
    /// itself from the registry when dropped.
    pub fn connect(self: &Arc<Self>) -> StreamConnection {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let id = self.register(tx);
        log::info!("[Stream] Client connected ({} connected)", self.len());

        StreamConnection {
            id,
            receiver: rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a connection.
    ///
    /// Idempotent: returns `false` if `id` was never registered or has already
    /// been removed.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        self.lock().connections.remove(&id).is_some()
    }

    /// Write `frame` to every registered connection, in registration order.
    ///
    /// Returns the number of connections registered when the broadcast began.
    /// A connection whose write fails (closed, or its buffer is full) is
    /// dropped from the registry; the failure is logged, not returned.
    pub fn broadcast(&self, frame: StreamFrame) -> usize {
        let frame = Arc::new(frame);
        let mut inner = self.lock();
        let attempted = inner.connections.len();

        let failed: Vec<ConnectionId> = inner
            .connections
            .iter()
            .filter_map(|(id, tx)| match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("[Stream] Write to connection {} failed: {e}", id.0);
                    Some(*id)
                }
            })
            .collect();

        for id in failed {
            inner.connections.remove(&id);
        }

        attempted
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.lock().connections.len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving side of one open connection.
///
/// Dropping it (the HTTP response body ends because the client went away,
/// the network failed, or the server is shutting down) unregisters the
/// connection before any further broadcast can target it.
#[derive(Debug)]
pub struct StreamConnection {
    id: ConnectionId,
    receiver: mpsc::Receiver<Arc<StreamFrame>>,
    registry: Arc<StreamRegistry>,
}

impl Stream for StreamConnection {
    type Item = Arc<StreamFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if self.registry.unregister(self.id) {
            log::info!(
                "[Stream] Client disconnected ({} connected)",
                self.registry.len()
            );
        }
    }
}
