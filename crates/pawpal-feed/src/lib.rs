//! # pawpal-feed
//!
//! Live one-to-one conversations between PawPal users.
//!
//! [`FeedEngine::open_conversation`] subscribes to every message the signed-in
//! user takes part in and keeps a [`FeedHandle`] current, newest first.
//! Sending goes straight to the store; the sent message reaches the feed (of
//! both users) through the same subscription.

pub mod engine;
pub mod error;
pub mod handle;
pub mod message;

pub use engine::{conversation_query, FeedConfig, FeedEngine, FeedScope};
pub use error::{FeedError, MessageError};
pub use handle::{CloseReason, FeedHandle, FeedStatus, FeedView, SendOutcome};
pub use message::{Message, OutgoingMessage, Participants};
