//! Identity and record types for Gazetteer entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A document body: named fields mapped to JSON values.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Name of the field the store identifier is serialized under.
pub const ID_FIELD: &str = "_id";

/// Opaque, store-assigned record identifier.
///
/// The core never inspects the structure of an identifier. Whether a raw
/// string is well-formed is decided by the store that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap a raw identifier string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a new UUIDv7 identifier (timestamp-sortable).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// A persisted document together with its store identifier.
///
/// `id` is `None` only when the store was asked to omit identifiers
/// from a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    #[serde(flatten)]
    pub fields: Document,
}

impl Record {
    pub fn new(id: Identifier, fields: Document) -> Self {
        Self {
            id: Some(id),
            fields,
        }
    }

    /// Build a record that carries no identifier.
    pub fn anonymous(fields: Document) -> Self {
        Self { id: None, fields }
    }

    /// Get a field value, treating JSON null as absent.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Get a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.as_str())
    }
}
