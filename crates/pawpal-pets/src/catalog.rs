//! Pet listings, favorites and adoption on top of a [`DocumentStore`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use pawpal_shared::constants::{
    FAVORITES_COLLECTION, FIELD_ADOPTED, FIELD_ADOPTED_AT, FIELD_ADOPTED_BY, FIELD_CREATED_AT,
    FIELD_PET_ID, FIELD_SAVED_AT, FIELD_USER_ID, PETS_COLLECTION,
};
use pawpal_shared::{DocumentId, IdentityProvider, UserId};
use pawpal_store::{Direction, DocumentData, DocumentStore, Query};

use crate::error::PetError;
use crate::models::{Favorite, NewPet, Pet};

/// Result of [`PetCatalog::save_favorite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added(DocumentId),
    AlreadyFavorite,
}

#[derive(Clone)]
pub struct PetCatalog {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl PetCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    fn current_user(&self) -> Result<UserId, PetError> {
        self.identity
            .current_user()
            .map(|u| u.id)
            .ok_or(PetError::Unauthenticated)
    }

    // ─── Listings ───

    pub async fn add_pet(&self, pet: NewPet) -> Result<DocumentId, PetError> {
        let name = pet.name.trim().to_string();
        let id = self
            .store
            .insert(PETS_COLLECTION, pet.into_document_data()?)
            .await?;
        info!(pet_id = %id, name = %name, "Pet listed");
        Ok(id)
    }

    pub async fn get_pet(&self, id: &DocumentId) -> Result<Option<Pet>, PetError> {
        match self.store.get(PETS_COLLECTION, id).await? {
            Some(doc) => Ok(Some(Pet::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// Pets not yet adopted, newest listing first.
    pub async fn list_adoptable(&self) -> Result<Vec<Pet>, PetError> {
        let query = Query::new(PETS_COLLECTION)
            .where_eq(FIELD_ADOPTED, false)
            .order_by(FIELD_CREATED_AT, Direction::Descending);

        let docs = self.store.query(&query).await?;
        Ok(docs
            .iter()
            .filter_map(|doc| match Pet::from_document(doc) {
                Ok(pet) => Some(pet),
                Err(e) => {
                    warn!(pet_id = %doc.id, error = %e, "skipping malformed pet");
                    None
                }
            })
            .collect())
    }

    /// Mark a pet as adopted by the signed-in user.
    pub async fn adopt(&self, pet_id: &DocumentId) -> Result<(), PetError> {
        let user = self.current_user()?;
        let pet = self
            .get_pet(pet_id)
            .await?
            .ok_or_else(|| PetError::NotFound(pet_id.clone()))?;
        if pet.adopted {
            return Err(PetError::AlreadyAdopted(pet_id.clone()));
        }

        let data = DocumentData::new()
            .set(FIELD_ADOPTED, true)
            .set(FIELD_ADOPTED_BY, user.as_str())
            .server_timestamp(FIELD_ADOPTED_AT);
        self.store.update(PETS_COLLECTION, pet_id, data).await?;

        info!(pet_id = %pet_id, user = %user, "Pet adopted");
        Ok(())
    }

    // ─── Favorites ───

    async fn find_favorite(
        &self,
        user: &UserId,
        pet_id: &DocumentId,
    ) -> Result<Option<Favorite>, PetError> {
        let query = Query::new(FAVORITES_COLLECTION)
            .where_eq(FIELD_USER_ID, user.as_str())
            .where_eq(FIELD_PET_ID, pet_id.as_str())
            .limit(1);
        match self.store.query(&query).await?.first() {
            Some(doc) => Ok(Some(Favorite::from_document(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn is_favorite(&self, pet_id: &DocumentId) -> Result<bool, PetError> {
        let user = self.current_user()?;
        Ok(self.find_favorite(&user, pet_id).await?.is_some())
    }

    /// Save a pet to the signed-in user's favorites.  Saving the same pet
    /// twice leaves a single record.
    pub async fn save_favorite(&self, pet_id: &DocumentId) -> Result<FavoriteOutcome, PetError> {
        let user = self.current_user()?;
        if self.get_pet(pet_id).await?.is_none() {
            return Err(PetError::NotFound(pet_id.clone()));
        }
        if self.find_favorite(&user, pet_id).await?.is_some() {
            debug!(pet_id = %pet_id, user = %user, "already a favorite");
            return Ok(FavoriteOutcome::AlreadyFavorite);
        }

        let data = DocumentData::new()
            .set(FIELD_USER_ID, user.as_str())
            .set(FIELD_PET_ID, pet_id.as_str())
            .server_timestamp(FIELD_SAVED_AT);
        let id = self.store.insert(FAVORITES_COLLECTION, data).await?;

        info!(pet_id = %pet_id, user = %user, "Favorite saved");
        Ok(FavoriteOutcome::Added(id))
    }

    /// The signed-in user's favorite pets, most recently saved first.
    /// Favorites pointing at pets that no longer exist are skipped.
    pub async fn list_favorites(&self) -> Result<Vec<Pet>, PetError> {
        let user = self.current_user()?;
        let query = Query::new(FAVORITES_COLLECTION)
            .where_eq(FIELD_USER_ID, user.as_str())
            .order_by(FIELD_SAVED_AT, Direction::Descending);

        let mut pets = Vec::new();
        for doc in self.store.query(&query).await? {
            let favorite = match Favorite::from_document(&doc) {
                Ok(f) => f,
                Err(e) => {
                    warn!(favorite = %doc.id, error = %e, "skipping malformed favorite");
                    continue;
                }
            };
            let Some(pet_doc) = self.store.get(PETS_COLLECTION, &favorite.pet_id).await? else {
                debug!(pet_id = %favorite.pet_id, "favorite points at a missing pet");
                continue;
            };
            match Pet::from_document(&pet_doc) {
                Ok(pet) => pets.push(pet),
                Err(e) => warn!(pet_id = %favorite.pet_id, error = %e, "skipping malformed pet"),
            }
        }
        Ok(pets)
    }
}
