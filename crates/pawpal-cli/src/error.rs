use pawpal_shared::{IdError, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} is not a valid user id: {source}")]
    InvalidUserId {
        key: &'static str,
        #[source]
        source: IdError,
    },

    #[error("Cannot chat with yourself ({0})")]
    SameUser(UserId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}
