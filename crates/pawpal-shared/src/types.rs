use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdError;

// User identity = opaque id issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(IdError::Empty);
        }
        if id.trim() != id {
            return Err(IdError::Whitespace(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::str::FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned document identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Fresh random id, as assigned by a store on insert.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_empty() {
        assert!(matches!(UserId::new(""), Err(IdError::Empty)));
        assert!(matches!(UserId::new("   "), Err(IdError::Empty)));
    }

    #[test]
    fn test_user_id_rejects_padding() {
        assert!(matches!(UserId::new(" u1"), Err(IdError::Whitespace(_))));
    }

    #[test]
    fn test_user_id_serde_is_plain_string() {
        let id = UserId::new("u1").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("u1"));

        let back: UserId = serde_json::from_value(serde_json::json!("u1")).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<UserId>(serde_json::json!("")).is_err());
    }

    #[test]
    fn test_generated_document_ids_differ() {
        assert_ne!(DocumentId::generate(), DocumentId::generate());
    }
}
