//! v001 -- Initial schema creation.
//!
//! Every collection lives in the single `documents` table; fields are kept
//! as one JSON object per row.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT, -- write order
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    fields     TEXT NOT NULL,                     -- JSON object

    UNIQUE (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection, seq);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
