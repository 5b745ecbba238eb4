//! The direct message model and its persisted document shape.
//!
//! A message document has exactly these fields: `senderId`, `receiverId`,
//! `participants` (both ids, sender first), `text` and `createdAt` (filled by
//! the store).  The document id is the message id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pawpal_shared::constants::FIELD_CREATED_AT;
use pawpal_shared::{DocumentId, UserId};
use pawpal_store::{Document, DocumentData, StoreError};

use crate::error::MessageError;

/// The two users of a direct conversation.  Equality ignores order.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct Participants([UserId; 2]);

impl Participants {
    pub fn new(first: UserId, second: UserId) -> Self {
        Self([first, second])
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.0.contains(user)
    }

    /// The member that is not `user`, if `user` is a member.
    pub fn other_than(&self, user: &UserId) -> Option<&UserId> {
        match &self.0 {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }

    pub fn members(&self) -> &[UserId; 2] {
        &self.0
    }
}

impl PartialEq for Participants {
    fn eq(&self, other: &Self) -> bool {
        let [a, b] = &self.0;
        (a, b) == (&other.0[0], &other.0[1]) || (a, b) == (&other.0[1], &other.0[0])
    }
}

impl TryFrom<Vec<UserId>> for Participants {
    type Error = String;

    fn try_from(members: Vec<UserId>) -> Result<Self, Self::Error> {
        match <[UserId; 2]>::try_from(members) {
            Ok([a, b]) if a != b => Ok(Self([a, b])),
            Ok(_) => Err("participants must be two distinct users".to_string()),
            Err(members) => Err(format!(
                "participants must have exactly 2 members, got {}",
                members.len()
            )),
        }
    }
}

impl From<Participants> for Vec<UserId> {
    fn from(p: Participants) -> Self {
        p.0.into()
    }
}

/// A message as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: DocumentId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub participants: Participants,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMessage {
    sender_id: UserId,
    receiver_id: UserId,
    participants: Participants,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn from_document(doc: &Document) -> Result<Self, MessageError> {
        let stored: StoredMessage = doc.decode()?;

        if stored.participants
            != Participants::new(stored.sender_id.clone(), stored.receiver_id.clone())
        {
            return Err(MessageError::ParticipantsMismatch);
        }
        if stored.text.trim().is_empty() {
            return Err(MessageError::EmptyText);
        }

        Ok(Self {
            id: doc.id.clone(),
            sender_id: stored.sender_id,
            receiver_id: stored.receiver_id,
            participants: stored.participants,
            text: stored.text,
            created_at: stored.created_at,
        })
    }

    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

/// A message about to be written.  `createdAt` is left to the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    sender_id: UserId,
    receiver_id: UserId,
    participants: Participants,
    text: String,
}

impl OutgoingMessage {
    /// `text` must already be trimmed and non-empty.
    pub fn new(sender: UserId, receiver: UserId, text: &str) -> Self {
        Self {
            participants: Participants::new(sender.clone(), receiver.clone()),
            sender_id: sender,
            receiver_id: receiver,
            text: text.to_string(),
        }
    }

    pub fn into_document_data(self) -> Result<DocumentData, StoreError> {
        Ok(DocumentData::from_serializable(&self)?.server_timestamp(FIELD_CREATED_AT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pawpal_store::format_timestamp;
    use serde_json::{json, Value};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(fields) => Document::new(DocumentId::from("m1"), fields),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_participants_equality_ignores_order() {
        assert_eq!(
            Participants::new(uid("a"), uid("b")),
            Participants::new(uid("b"), uid("a"))
        );
        assert_ne!(
            Participants::new(uid("a"), uid("b")),
            Participants::new(uid("a"), uid("c"))
        );
    }

    #[test]
    fn test_other_than() {
        let p = Participants::new(uid("a"), uid("b"));
        assert_eq!(p.other_than(&uid("a")), Some(&uid("b")));
        assert_eq!(p.other_than(&uid("b")), Some(&uid("a")));
        assert_eq!(p.other_than(&uid("c")), None);
    }

    #[test]
    fn test_participants_must_be_a_distinct_pair() {
        assert!(Participants::try_from(vec![uid("a")]).is_err());
        assert!(Participants::try_from(vec![uid("a"), uid("b"), uid("c")]).is_err());
        assert!(Participants::try_from(vec![uid("a"), uid("a")]).is_err());
    }

    #[test]
    fn test_outgoing_document_shape() {
        let data = OutgoingMessage::new(uid("u1"), uid("u2"), "hi")
            .into_document_data()
            .unwrap();

        let mut keys: Vec<_> = data.fields().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["participants", "receiverId", "senderId", "text"]);
        assert_eq!(data.fields()["participants"], json!(["u1", "u2"]));
        assert_eq!(data.server_timestamp_fields(), ["createdAt".to_string()]);
    }

    #[test]
    fn test_from_document() {
        let now = Utc::now();
        let msg = Message::from_document(&doc(json!({
            "senderId": "u1",
            "receiverId": "u2",
            "participants": ["u1", "u2"],
            "text": "hi",
            "createdAt": format_timestamp(now),
        })))
        .unwrap();

        assert_eq!(msg.id, DocumentId::from("m1"));
        assert!(msg.is_from(&uid("u1")));
        assert_eq!(msg.receiver_id, uid("u2"));
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.created_at, now);
    }

    #[test]
    fn test_from_document_rejects_inconsistent_participants() {
        let err = Message::from_document(&doc(json!({
            "senderId": "u1",
            "receiverId": "u2",
            "participants": ["u1", "u3"],
            "text": "hi",
            "createdAt": format_timestamp(Utc::now()),
        })))
        .unwrap_err();
        assert!(matches!(err, MessageError::ParticipantsMismatch));
    }

    #[test]
    fn test_from_document_rejects_missing_timestamp_and_blank_text() {
        let missing = Message::from_document(&doc(json!({
            "senderId": "u1",
            "receiverId": "u2",
            "participants": ["u1", "u2"],
            "text": "hi",
        })));
        assert!(matches!(missing, Err(MessageError::Decode(_))));

        let blank = Message::from_document(&doc(json!({
            "senderId": "u1",
            "receiverId": "u2",
            "participants": ["u1", "u2"],
            "text": "  ",
            "createdAt": format_timestamp(Utc::now()),
        })));
        assert!(matches!(blank, Err(MessageError::EmptyText)));
    }
}
