//! Document filters for store lookups and mutations.

use serde::{Deserialize, Serialize};

use crate::identity::{Document, Identifier, Record};

/// Selects documents within a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFilter {
    /// Match the document with this identifier.
    Id(Identifier),
    /// Match documents whose listed fields all equal the given values.
    Fields(Document),
}

impl DocumentFilter {
    pub fn by_id(id: Identifier) -> Self {
        Self::Id(id)
    }

    pub fn by_fields(fields: Document) -> Self {
        Self::Fields(fields)
    }

    /// Whether a stored record satisfies this filter.
    pub fn matches(&self, record: &Record) -> bool {
        match (self, &record.id) {
            (Self::Id(id), Some(record_id)) => id == record_id,
            (Self::Id(_), None) => false,
            (Self::Fields(_), _) => self.matches_fields(&record.fields),
        }
    }

    /// Whether a document stored under `id` satisfies this filter.
    pub fn matches_document(&self, id: &Identifier, fields: &Document) -> bool {
        match self {
            Self::Id(wanted) => wanted == id,
            Self::Fields(_) => self.matches_fields(fields),
        }
    }

    /// Absent fields compare equal to null.
    fn matches_fields(&self, document: &Document) -> bool {
        let Self::Fields(wanted) = self else {
            return false;
        };
        wanted.iter().all(|(name, expected)| {
            document.get(name).unwrap_or(&serde_json::Value::Null) == expected
        })
    }
}
