//! Types shared by every PawPal crate: identifiers, the identity provider
//! seam, and collection/field names.

pub mod constants;
pub mod error;
pub mod identity;
pub mod types;

pub use error::IdError;
pub use identity::{CurrentUser, IdentityProvider, StaticIdentity};
pub use types::{DocumentId, UserId};
