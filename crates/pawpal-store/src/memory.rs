//! In-process [`DocumentStore`].
//!
//! Used as the fake backend in tests across the workspace, so it can also be
//! told to fail: [`MemoryStore::fail_next_insert`] makes the next insert
//! return an error and [`MemoryStore::fail_subscriptions`] kills every live
//! subscription the way a dropped connection would.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use pawpal_shared::DocumentId;

use crate::document::{Document, DocumentData, ServerClock};
use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::store::DocumentStore;
use crate::subscription::{SubscriberRegistry, Subscription};

type Collections = HashMap<String, Vec<Document>>;

struct MemoryInner {
    collections: Mutex<Collections>,
    registry: Arc<SubscriberRegistry>,
    clock: ServerClock,
    fail_next_insert: Mutex<Option<StoreError>>,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                collections: Mutex::new(HashMap::new()),
                registry: SubscriberRegistry::new(),
                clock: ServerClock::new(),
                fail_next_insert: Mutex::new(None),
            }),
        }
    }

    fn collections(&self) -> MutexGuard<'_, Collections> {
        self.inner
            .collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Store a document exactly as given, bypassing id and timestamp
    /// assignment.  Live subscriptions are notified as for any write.
    pub fn put_raw(&self, collection: &str, doc: Document) {
        let mut collections = self.collections();
        let docs = collections.entry(collection.to_string()).or_default();
        docs.retain(|d| d.id != doc.id);
        docs.push(doc);
        self.notify_locked(&collections, collection);
    }

    /// Make the next `insert` fail with `error`.
    pub fn fail_next_insert(&self, error: StoreError) {
        let mut slot = self
            .inner
            .fail_next_insert
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(error);
    }

    /// Deliver an `Unavailable` error to every live subscription and drop them.
    pub fn fail_subscriptions(&self, reason: &str) {
        self.inner
            .registry
            .fail_all(|| StoreError::Unavailable(reason.to_string()));
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections().get(collection).map_or(0, Vec::len)
    }

    fn notify_locked(&self, collections: &Collections, collection: &str) {
        let docs = collections.get(collection);
        self.inner.registry.notify(collection, |query| {
            Ok(query.apply(docs.into_iter().flatten()))
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, data: DocumentData) -> Result<DocumentId> {
        let injected = self
            .inner
            .fail_next_insert
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(err) = injected {
            return Err(err);
        }

        let id = DocumentId::generate();
        let mut collections = self.collections();
        let fields = data.resolve(self.inner.clock.now());
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id.clone(), fields));

        debug!(collection, doc = %id, "document inserted");
        self.notify_locked(&collections, collection);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        Ok(self
            .collections()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| &d.id == id))
            .cloned())
    }

    async fn update(&self, collection: &str, id: &DocumentId, data: DocumentData) -> Result<()> {
        let mut collections = self.collections();
        let now = self.inner.clock.now();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| &d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        doc.fields.extend(data.resolve(now));

        debug!(collection, doc = %id, "document updated");
        self.notify_locked(&collections, collection);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let collections = self.collections();
        Ok(query.apply(collections.get(&query.collection).into_iter().flatten()))
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription> {
        let collections = self.collections();
        let initial = query.apply(collections.get(&query.collection).into_iter().flatten());
        Ok(self.inner.registry.register(query, initial))
    }
}
