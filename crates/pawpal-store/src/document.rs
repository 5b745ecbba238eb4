//! Schema-less documents and the data written into them.
//!
//! Field values are plain [`serde_json::Value`]s.  Timestamps are stored as
//! RFC 3339 UTC strings with a fixed nanosecond precision, so two timestamps
//! compare the same way as strings and as instants.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pawpal_shared::DocumentId;

use crate::error::{Result, StoreError};

/// Field map of a single document.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: its store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Decode the fields into a typed struct.  The id is not part of the
    /// fields; callers attach it themselves.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Fields to write on insert or merge on update, plus the fields the store
/// must fill with its own clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentData {
    fields: Fields,
    server_timestamps: Vec<String>,
}

impl DocumentData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any value that serializes to a JSON object.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self {
                fields,
                server_timestamps: Vec::new(),
            }),
            other => Err(StoreError::InvalidDocument(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Ask the store to fill `field` with its write time.
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.remove(&field);
        self.server_timestamps.push(field);
        self
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Resolve server timestamps against `now` and return the final fields.
    pub fn resolve(self, now: DateTime<Utc>) -> Fields {
        let mut fields = self.fields;
        let stamp = format_timestamp(now);
        for field in self.server_timestamps {
            fields.insert(field, Value::String(stamp.clone()));
        }
        fields
    }
}

/// Canonical textual form of a stored timestamp.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Source of server timestamps.  Never hands out the same instant twice, so
/// writes from one store instance are strictly ordered by time.
#[derive(Debug, Default)]
pub struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::nanoseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Note {
        title: String,
    }

    #[test]
    fn test_from_serializable_requires_object() {
        let data = DocumentData::from_serializable(&Note {
            title: "hi".into(),
        })
        .unwrap();
        assert_eq!(data.fields().get("title"), Some(&json!("hi")));

        let err = DocumentData::from_serializable(&42).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[test]
    fn test_resolve_fills_server_timestamps() {
        let now = Utc::now();
        let fields = DocumentData::new()
            .set("text", "hi")
            .set("createdAt", "client clock")
            .server_timestamp("createdAt")
            .resolve(now);

        assert_eq!(fields.get("text"), Some(&json!("hi")));
        let stamp = fields.get("createdAt").and_then(Value::as_str).unwrap();
        assert_eq!(parse_timestamp(stamp), Some(now));
    }

    #[test]
    fn test_timestamp_strings_sort_chronologically() {
        let a = Utc::now();
        let b = a + Duration::milliseconds(1);
        assert!(format_timestamp(a) < format_timestamp(b));
    }

    #[test]
    fn test_server_clock_strictly_increases() {
        let clock = ServerClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_decode() {
        #[derive(Deserialize)]
        struct Title {
            title: String,
        }

        let doc = Document::new(
            DocumentId::from("d1"),
            DocumentData::new().set("title", "x").resolve(Utc::now()),
        );
        let title: Title = doc.decode().unwrap();
        assert_eq!(title.title, "x");
    }
}
