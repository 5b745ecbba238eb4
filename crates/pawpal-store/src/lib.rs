//! # pawpal-store
//!
//! Document storage for PawPal.
//!
//! The [`DocumentStore`] trait is the only thing the rest of the workspace
//! depends on: schema-less documents grouped in collections, queried with
//! equality / array-membership filters and a single-field ordering, and
//! observed through live [`Subscription`]s that re-deliver the full result set
//! on every change.
//!
//! Two implementations are provided: [`MemoryStore`] for tests and ephemeral
//! sessions, and [`SqliteStore`], which persists documents as JSON rows in a
//! local SQLite database.

pub mod database;
pub mod document;
pub mod documents;
pub mod memory;
pub mod migrations;
pub mod query;
pub mod sqlite;
pub mod store;
pub mod subscription;

mod error;

pub use database::Database;
pub use document::{format_timestamp, parse_timestamp, Document, DocumentData, Fields, ServerClock};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, OrderBy, Query};
pub use sqlite::SqliteStore;
pub use store::DocumentStore;
pub use subscription::{CancelHandle, SnapshotEvent, SubscriberRegistry, Subscription, SubscriptionId};
