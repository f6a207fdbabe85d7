//! Composite natural keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::identity::{Document, Record};

/// Normalize a string key value: trim surrounding whitespace and lower-case.
pub fn normalize_str(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// One slot of a composite key.
///
/// Values are reduced to a hashable, totally ordered form. Numbers keep their
/// textual JSON representation so `5` and `5.0` stay distinct slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum KeyPart {
    /// The field was absent or null in the record.
    Missing,
    Bool(bool),
    Number(String),
    Text(String),
    /// Arrays and objects, in canonical JSON text.
    Json(String),
}

impl KeyPart {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.to_string()),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Json(other.to_string()),
        }
    }
}

impl From<Option<&Value>> for KeyPart {
    fn from(value: Option<&Value>) -> Self {
        value.map(KeyPart::from).unwrap_or(KeyPart::Missing)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("<missing>"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) | Self::Json(n) => f.write_str(n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Ordered tuple of key-field values identifying an entity independently of
/// its store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(Vec<KeyPart>);

impl CompositeKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Build a key by reading each key field from a document, in order.
    pub fn from_document<S: AsRef<str>>(key_fields: &[S], document: &Document) -> Self {
        Self(
            key_fields
                .iter()
                .map(|field| KeyPart::from(document.get(field.as_ref())))
                .collect(),
        )
    }

    /// Build a key from a stored record.
    pub fn from_record<S: AsRef<str>>(key_fields: &[S], record: &Record) -> Self {
        Self::from_document(key_fields, &record.fields)
    }

    /// Build a key from positional values.
    pub fn from_values(values: &[Value]) -> Self {
        Self(values.iter().map(KeyPart::from).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Unwrap a single-slot key into its scalar part.
    pub fn into_single(self) -> Option<KeyPart> {
        let mut parts = self.0;
        if parts.len() == 1 {
            parts.pop()
        } else {
            None
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", part)?;
        }
        f.write_str(")")
    }
}
