//! Live query subscriptions.
//!
//! A [`Subscription`] receives the full result set of its query: once right
//! after subscribing, then again whenever a write changes that result set.
//! Stores keep their subscribers in a [`SubscriberRegistry`] and call
//! [`SubscriberRegistry::notify`] while still holding their write lock, so
//! snapshots are delivered in write order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::query::Query;

/// Identifier of one live subscription within a store.
pub type SubscriptionId = u64;

/// Event delivered to a subscription.
#[derive(Debug)]
pub enum SnapshotEvent {
    /// The complete, ordered result set of the query.
    Snapshot(Vec<Document>),
    /// The subscription failed.  Nothing is delivered after this.
    Error(StoreError),
}

struct Subscriber {
    query: Query,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
    last: Vec<Document>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: SubscriptionId,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

/// Bookkeeping for the live subscriptions of one store.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
}

impl SubscriberRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a subscription and deliver `initial` as its first snapshot.
    pub fn register(self: &Arc<Self>, query: Query, initial: Vec<Document>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        // The receiver is alive until this function returns.
        let _ = tx.send(SnapshotEvent::Snapshot(initial.clone()));

        debug!(subscription = id, collection = %query.collection, "subscription opened");
        inner.subscribers.insert(
            id,
            Subscriber {
                query,
                tx,
                last: initial,
            },
        );

        Subscription {
            rx,
            cancel: CancelHandle {
                id,
                registry: Arc::downgrade(self),
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Re-evaluate every subscription on `collection` and deliver a snapshot
    /// to those whose result set changed.
    ///
    /// `load` evaluates a query against the store's current contents.  A
    /// subscriber whose query fails to load gets an error and is dropped, as
    /// is any subscriber whose receiver has gone away.
    pub fn notify<F>(&self, collection: &str, mut load: F)
    where
        F: FnMut(&Query) -> Result<Vec<Document>>,
    {
        let mut inner = self.lock();
        let mut dead = Vec::new();

        for (id, sub) in inner.subscribers.iter_mut() {
            if sub.query.collection != collection {
                continue;
            }
            match load(&sub.query) {
                Ok(docs) => {
                    if docs == sub.last {
                        continue;
                    }
                    sub.last = docs.clone();
                    if sub.tx.send(SnapshotEvent::Snapshot(docs)).is_err() {
                        dead.push(*id);
                    }
                }
                Err(e) => {
                    warn!(subscription = id, error = %e, "failed to evaluate live query");
                    let _ = sub.tx.send(SnapshotEvent::Error(e));
                    dead.push(*id);
                }
            }
        }

        for id in dead {
            inner.subscribers.remove(&id);
        }
    }

    /// Deliver an error to every subscription and drop them all.
    pub fn fail_all<F>(&self, make_error: F)
    where
        F: Fn() -> StoreError,
    {
        let mut inner = self.lock();
        for (id, sub) in inner.subscribers.drain() {
            debug!(subscription = id, "failing subscription");
            let _ = sub.tx.send(SnapshotEvent::Error(make_error()));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: SubscriptionId) {
        if self.lock().subscribers.remove(&id).is_some() {
            debug!(subscription = id, "subscription cancelled");
        }
    }
}

/// Cancels a subscription from anywhere.  Cloneable; cancelling twice is a no-op.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    id: SubscriptionId,
    registry: Weak<SubscriberRegistry>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A live query.  Dropping it cancels it.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
    cancel: CancelHandle,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.cancel.id
    }

    /// Wait for the next event.  Returns `None` once cancelled, after an
    /// error has been delivered, or when the store is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let event = self.rx.recv().await?;
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(event)
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
