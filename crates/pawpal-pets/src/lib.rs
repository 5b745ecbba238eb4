//! # pawpal-pets
//!
//! The pet catalog: listings, adoption and per-user favorites, stored in the
//! `pets` and `favorites` collections of a [`pawpal_store::DocumentStore`].

pub mod catalog;
pub mod error;
pub mod models;

pub use catalog::{FavoriteOutcome, PetCatalog};
pub use error::PetError;
pub use models::{Favorite, NewPet, Pet};
