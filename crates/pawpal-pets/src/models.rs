use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pawpal_shared::constants::{FIELD_ADOPTED, FIELD_CREATED_AT};
use pawpal_shared::{DocumentId, UserId};
use pawpal_store::{Document, DocumentData, StoreError};

use crate::error::PetError;

/// A pet listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pet {
    pub id: DocumentId,
    pub name: String,
    pub pet_type: String,
    pub age: String,
    pub image_url: Option<String>,
    pub adopted: bool,
    pub created_at: DateTime<Utc>,
    pub adopted_by: Option<UserId>,
    pub adopted_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPet {
    name: String,
    #[serde(rename = "type")]
    pet_type: String,
    age: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    adopted: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    adopted_by: Option<UserId>,
    #[serde(default)]
    adopted_at: Option<DateTime<Utc>>,
}

impl Pet {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let stored: StoredPet = doc.decode()?;
        Ok(Self {
            id: doc.id.clone(),
            name: stored.name,
            pet_type: stored.pet_type,
            age: stored.age,
            image_url: stored.image_url,
            adopted: stored.adopted,
            created_at: stored.created_at,
            adopted_by: stored.adopted_by,
            adopted_at: stored.adopted_at,
        })
    }
}

/// A listing about to be added.  `image_url` must already point at a hosted
/// image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPet {
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: String,
    pub age: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewPet {
    pub fn new(name: impl Into<String>, pet_type: impl Into<String>, age: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pet_type: pet_type.into(),
            age: age.into(),
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Trim every field and reject blank required ones.
    fn normalized(self) -> Result<Self, PetError> {
        let required = |field: &str, value: String| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(PetError::Validation(format!("{field} is required")))
            } else {
                Ok(value)
            }
        };

        Ok(Self {
            name: required("name", self.name)?,
            pet_type: required("type", self.pet_type)?,
            age: required("age", self.age)?,
            image_url: self
                .image_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        })
    }

    pub(crate) fn into_document_data(self) -> Result<DocumentData, PetError> {
        let pet = self.normalized()?;
        Ok(DocumentData::from_serializable(&pet)?
            .set(FIELD_ADOPTED, false)
            .server_timestamp(FIELD_CREATED_AT))
    }
}

/// A pet saved by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Favorite {
    pub id: DocumentId,
    pub user_id: UserId,
    pub pet_id: DocumentId,
    pub saved_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFavorite {
    user_id: UserId,
    pet_id: DocumentId,
    saved_at: DateTime<Utc>,
}

impl Favorite {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let stored: StoredFavorite = doc.decode()?;
        Ok(Self {
            id: doc.id.clone(),
            user_id: stored.user_id,
            pet_id: stored.pet_id,
            saved_at: stored.saved_at,
        })
    }
}
