use async_trait::async_trait;

use pawpal_shared::DocumentId;

use crate::document::{Document, DocumentData};
use crate::error::Result;
use crate::query::Query;
use crate::subscription::Subscription;

/// A document store with filtered queries and live subscriptions.
///
/// Implementations must deliver a fresh snapshot to every affected
/// subscription after each successful write, in write order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return its new id.  Fields named with
    /// [`DocumentData::server_timestamp`] are filled with the store's clock.
    async fn insert(&self, collection: &str, data: DocumentData) -> Result<DocumentId>;

    async fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>>;

    /// Merge `data` into an existing document.
    async fn update(&self, collection: &str, id: &DocumentId, data: DocumentData) -> Result<()>;

    /// One-shot read of a query's current result set.
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Open a live query.  The first event is the current result set.
    async fn subscribe(&self, query: Query) -> Result<Subscription>;
}
