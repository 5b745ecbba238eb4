use thiserror::Error;

use pawpal_shared::DocumentId;
use pawpal_store::StoreError;

#[derive(Error, Debug)]
pub enum PetError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Invalid pet: {0}")]
    Validation(String),

    #[error("Pet not found: {0}")]
    NotFound(DocumentId),

    #[error("Pet {0} has already been adopted")]
    AlreadyAdopted(DocumentId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
