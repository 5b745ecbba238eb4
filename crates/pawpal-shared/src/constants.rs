/// Application name
pub const APP_NAME: &str = "PawPal";

/// Collection holding direct messages
pub const MESSAGES_COLLECTION: &str = "messages";

/// Collection holding pet listings
pub const PETS_COLLECTION: &str = "pets";

/// Collection holding (user, pet) favorite records
pub const FAVORITES_COLLECTION: &str = "favorites";

/// Message document fields
pub const FIELD_PARTICIPANTS: &str = "participants";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Pet document fields
pub const FIELD_ADOPTED: &str = "adopted";
pub const FIELD_ADOPTED_BY: &str = "adoptedBy";
pub const FIELD_ADOPTED_AT: &str = "adoptedAt";

/// Favorite document fields
pub const FIELD_USER_ID: &str = "userId";
pub const FIELD_PET_ID: &str = "petId";
pub const FIELD_SAVED_AT: &str = "savedAt";

/// Database file name inside the platform data directory
pub const DB_FILE_NAME: &str = "pawpal.db";
