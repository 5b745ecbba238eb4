//! [`DocumentStore`] persisted in a local SQLite database.
//!
//! Queries are evaluated in process over the rows of one collection.  Live
//! subscriptions observe every write made through the same `SqliteStore`
//! (and its clones); writes from another process are not seen.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use pawpal_shared::DocumentId;

use crate::database::Database;
use crate::document::{Document, DocumentData, ServerClock};
use crate::error::{Result, StoreError};
use crate::query::Query;
use crate::store::DocumentStore;
use crate::subscription::{SubscriberRegistry, Subscription};

struct SqliteInner {
    db: Mutex<Database>,
    registry: Arc<SubscriberRegistry>,
    clock: ServerClock,
}

#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<SqliteInner>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(SqliteInner {
                db: Mutex::new(db),
                registry: SubscriberRegistry::new(),
                clock: ServerClock::new(),
            }),
        }
    }

    /// Open the database in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Database::new()?))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.inner.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    fn notify_locked(&self, db: &Database, collection: &str) {
        // Load the collection once for all subscribers.
        let docs = db.list_documents(collection);
        self.inner.registry.notify(collection, |query| match &docs {
            Ok(docs) => Ok(query.apply(docs)),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        });
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: &str, data: DocumentData) -> Result<DocumentId> {
        let id = DocumentId::generate();
        let db = self.db();
        let doc = Document::new(id.clone(), data.resolve(self.inner.clock.now()));
        db.insert_document(collection, &doc)?;

        debug!(collection, doc = %id, "document inserted");
        self.notify_locked(&db, collection);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        self.db().get_document(collection, id)
    }

    async fn update(&self, collection: &str, id: &DocumentId, data: DocumentData) -> Result<()> {
        let db = self.db();
        let mut doc = db
            .get_document(collection, id)?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        doc.fields.extend(data.resolve(self.inner.clock.now()));
        db.replace_fields(collection, id, &doc.fields)?;

        debug!(collection, doc = %id, "document updated");
        self.notify_locked(&db, collection);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let docs = self.db().list_documents(&query.collection)?;
        Ok(query.apply(&docs))
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription> {
        let db = self.db();
        let docs = db.list_documents(&query.collection)?;
        let initial = query.apply(&docs);
        Ok(self.inner.registry.register(query, initial))
    }
}
