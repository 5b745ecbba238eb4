//! Row-level CRUD for documents stored as JSON.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use pawpal_shared::DocumentId;

use crate::database::Database;
use crate::document::{Document, Fields};
use crate::error::{Result, StoreError};

impl Database {
    pub fn insert_document(&self, collection: &str, doc: &Document) -> Result<()> {
        self.conn().execute(
            "INSERT INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)",
            params![
                collection,
                doc.id.as_str(),
                serde_json::to_string(&doc.fields)?
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, fields FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(id, fields)| decode_row(id, &fields)).transpose()
    }

    /// Overwrite the fields of an existing document.  Returns `false` if no
    /// such document exists.
    pub fn replace_fields(&self, collection: &str, id: &DocumentId, fields: &Fields) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE documents SET fields = ?1 WHERE collection = ?2 AND id = ?3",
            params![serde_json::to_string(fields)?, collection, id.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// All documents of a collection, in write order.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, fields FROM documents
             WHERE collection = ?1
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, fields) = row?;
            docs.push(decode_row(id, &fields)?);
        }
        Ok(docs)
    }
}

fn decode_row(id: String, fields: &str) -> Result<Document> {
    match serde_json::from_str::<Value>(fields)? {
        Value::Object(fields) => Ok(Document::new(DocumentId::from(id), fields)),
        _ => Err(StoreError::InvalidDocument(format!(
            "row {id} does not hold a JSON object"
        ))),
    }
}
