use thiserror::Error;

use pawpal_shared::UserId;
use pawpal_store::StoreError;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Signed-in user changed from {expected} to {actual}")]
    IdentityChanged { expected: UserId, actual: UserId },

    #[error("Cannot open a conversation with yourself ({0})")]
    InvalidCounterpart(UserId),

    #[error("Conversation feed is closed")]
    Closed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Why a stored document is not a valid message.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Undecodable message document: {0}")]
    Decode(#[from] StoreError),

    #[error("Participants do not match sender and receiver")]
    ParticipantsMismatch,

    #[error("Message text is empty")]
    EmptyText,
}
