//! Gazetteer Core - Entity Types
//!
//! Data structures shared by every Gazetteer crate: records and identifiers,
//! composite natural keys, attribute schemas, cache configuration, the clock
//! seam and the error taxonomy. This crate performs no I/O.

pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod key;
pub mod schema;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CACHE_TTL_ENV};
pub use error::{ConfigError, GazetteerError, GazetteerResult, StoreError, ValidationError};
pub use filter::DocumentFilter;
pub use identity::{Document, Identifier, Record, ID_FIELD};
pub use key::{normalize_str, CompositeKey, KeyPart};
pub use schema::{AttributeSchema, EntitySchema, FieldSpec, FieldType};
