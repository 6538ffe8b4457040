//! State Flow
//!
//! A current-value cell with ordered fan-out to subscribers.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

struct Shared<T> {
    /// Latest published value
    value: RwLock<T>,
    /// Publish point. Held while a value is stored and fanned out, and while a
    /// subscriber snapshots the current value and registers.
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Shared<T> {
    fn value(&self) -> T {
        self.value.read().clone()
    }

    async fn subscribe(&self) -> Subscription<T> {
        let mut subscribers = self.subscribers.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let current = self.value();
        subscribers.push(tx);

        Subscription {
            pending: Some(current),
            rx,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MutableStateFlow
// ─────────────────────────────────────────────────────────────────────────────

/// Writable state flow. Owned by the generated store, never exposed directly.
pub struct MutableStateFlow<T> {
    shared: Arc<Shared<T>>,
}

impl<T> MutableStateFlow<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a flow holding `initial` as its current value
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                value: RwLock::new(initial),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Snapshot of the current value
    pub fn value(&self) -> T {
        self.shared.value()
    }

    /// Publish `value` as the next current value.
    ///
    /// Waits for the publish point, stores the value and queues it for every
    /// live subscriber. Concurrent emits are applied one at a time; the last
    /// one to reach the publish point wins.
    pub async fn emit(&self, value: T) {
        let mut subscribers = self.shared.subscribers.lock().await;
        *self.shared.value.write() = value.clone();
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        trace!(subscribers = subscribers.len(), "state flow emitted");
    }

    /// Read-only handle sharing this flow's state
    pub fn as_state_flow(&self) -> StateFlow<T> {
        StateFlow {
            shared: self.shared.clone(),
        }
    }

    /// Subscribe to the current value and every later one
    pub async fn subscribe(&self) -> Subscription<T> {
        self.shared.subscribe().await
    }

    /// Number of subscriptions registered at the last publish or subscribe
    pub async fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().await.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableStateFlow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableStateFlow")
            .field("value", &*self.shared.value.read())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StateFlow
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view of a [`MutableStateFlow`]
pub struct StateFlow<T> {
    shared: Arc<Shared<T>>,
}

impl<T> StateFlow<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Snapshot of the current value
    pub fn value(&self) -> T {
        self.shared.value()
    }

    /// Subscribe to the current value and every later one
    pub async fn subscribe(&self) -> Subscription<T> {
        self.shared.subscribe().await
    }
}

impl<T> Clone for StateFlow<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateFlow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateFlow")
            .field("value", &*self.shared.value.read())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered stream of values: the value current at subscription time, then
/// every published value after it.
///
/// Ends once every flow handle sharing the state has been dropped.
pub struct Subscription<T> {
    pending: Option<T>,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next value
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.pending.take() {
            return Some(value);
        }
        self.rx.recv().await
    }

    /// Next value if one is already queued
    pub fn try_next(&mut self) -> Option<T> {
        if let Some(value) = self.pending.take() {
            return Some(value);
        }
        self.rx.try_recv().ok()
    }
}

// Never pin-projected; values are moved out of `pending` by value.
impl<T> Unpin for Subscription<T> {}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if let Some(value) = this.pending.take() {
            return Poll::Ready(Some(value));
        }
        this.rx.poll_recv(cx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
