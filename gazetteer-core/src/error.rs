//! Error types for Gazetteer operations

use crate::key::CompositeKey;
use crate::schema::FieldType;
use thiserror::Error;

/// Malformed caller input. Always raised before any store mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Bad type for field {field}: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },

    #[error("Key fields must not be empty")]
    EmptyKeyFields,

    #[error("Key field {field} listed more than once")]
    DuplicateKeyField { field: String },

    #[error("Key field {field} not in attributes")]
    UnknownKeyField { field: String },

    #[error("Attribute {field} declared more than once")]
    DuplicateAttribute { field: String },

    #[error("Collection name must not be empty")]
    EmptyCollection,

    #[error("Key arity mismatch: expected {expected} values, got {got}")]
    KeyArity { expected: usize, got: usize },

    #[error("Invalid identifier: {raw:?}")]
    InvalidIdentifier { raw: String },

    #[error("Update for {collection} carries no schema fields")]
    EmptyPatch { collection: String },
}

/// Persistence layer failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Create failed on {collection}: no inserted id returned")]
    MissingInsertedId { collection: String },

    #[error("Record in {collection} has no identifier")]
    MissingRecordId { collection: String },

    #[error("Backend error on {collection}: {reason}")]
    Backend { collection: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Gazetteer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GazetteerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Missing required field {field} for {collection}")]
    MissingKey { collection: String, field: String },

    #[error("Duplicate {collection} record for key {key}")]
    Duplicate {
        collection: String,
        key: CompositeKey,
    },

    #[error("Record not found in {collection}: {target}")]
    NotFound { collection: String, target: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl GazetteerError {
    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::MissingKey { .. } | Self::Config(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Duplicate { .. } => 409,
            Self::Store(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for Gazetteer operations.
pub type GazetteerResult<T> = Result<T, GazetteerError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPart;

    #[test]
    fn test_type_mismatch_names_field() {
        let err = ValidationError::TypeMismatch {
            field: "population".to_string(),
            expected: FieldType::Float,
            found: "string",
        };
        let msg = err.to_string();
        assert!(msg.contains("population"));
        assert!(msg.contains("float"));
        assert!(msg.contains("string"));
    }

    #[test]
    fn test_duplicate_display_includes_key() {
        let err = GazetteerError::Duplicate {
            collection: "cities".to_string(),
            key: CompositeKey::new(vec![KeyPart::from("new york"), KeyPart::from("ny")]),
        };
        let msg = err.to_string();
        assert!(msg.contains("cities"));
        assert!(msg.contains("new york"));
    }

    #[test]
    fn test_from_variants() {
        let validation = GazetteerError::from(ValidationError::EmptyKeyFields);
        assert!(matches!(validation, GazetteerError::Validation(_)));

        let store = GazetteerError::from(StoreError::LockPoisoned);
        assert!(matches!(store, GazetteerError::Store(_)));

        let config = GazetteerError::from(ConfigError::InvalidValue {
            field: "ttl".to_string(),
            value: "x".to_string(),
            reason: "not a number".to_string(),
        });
        assert!(matches!(config, GazetteerError::Config(_)));
    }

    #[test]
    fn test_status_codes() {
        let not_found = GazetteerError::NotFound {
            collection: "states".to_string(),
            target: "abc".to_string(),
        };
        assert_eq!(not_found.status_code(), 404);
        assert!(not_found.is_not_found());

        let dup = GazetteerError::Duplicate {
            collection: "states".to_string(),
            key: CompositeKey::new(vec![KeyPart::from("texas")]),
        };
        assert_eq!(dup.status_code(), 409);

        let missing = GazetteerError::MissingKey {
            collection: "states".to_string(),
            field: "name".to_string(),
        };
        assert_eq!(missing.status_code(), 400);

        let store = GazetteerError::from(StoreError::Unavailable {
            reason: "connection refused".to_string(),
        });
        assert_eq!(store.status_code(), 500);
    }
}
