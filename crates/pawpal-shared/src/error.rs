use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier must not be empty")]
    Empty,

    #[error("Identifier has leading or trailing whitespace: {0:?}")]
    Whitespace(String),
}
