//! Gazetteer Storage - Document Store Trait, Cache and CRUD Controllers
//!
//! Defines the document-store abstraction the reference-data entities are
//! persisted through, the composite-key read-through cache layered on top of
//! it, and the generic CRUD controller every entity is built from.
//! A production driver implements [`DocumentStore`] outside this crate;
//! [`InMemoryDocumentStore`] serves tests and embedded use.

pub mod cache;
pub mod catalog;
pub mod controller;

pub use cache::{CacheStats, CompositeKeyCache, FlatView, Snapshot};
pub use catalog::{Catalog, CatalogConfig, DisasterKind};
pub use controller::CrudController;

use gazetteer_core::{
    Document, DocumentFilter, GazetteerResult, Identifier, Record, StoreError, ID_FIELD,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

// ============================================================================
// STORE RESULT TYPES
// ============================================================================

/// Result of a single-document insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Identifier assigned by the store. `None` means the insert was not
    /// acknowledged with an id.
    pub inserted_id: Option<Identifier>,
}

/// Result of a single-document update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
}

// ============================================================================
// DOCUMENT STORE TRAIT
// ============================================================================

/// Collection-scoped document persistence.
///
/// All calls block until the store answers. Implementations own their
/// connection handling and timeouts; callers perform no retries.
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return the identifier the store assigned.
    fn create(&self, collection: &str, document: &Document) -> GazetteerResult<InsertOutcome>;

    /// Scan a whole collection.
    ///
    /// When `include_identifier` is false the returned records carry no id.
    fn read_all(&self, collection: &str, include_identifier: bool) -> GazetteerResult<Vec<Record>>;

    /// First record matching the filter.
    fn read_one(&self, collection: &str, filter: &DocumentFilter)
        -> GazetteerResult<Option<Record>>;

    /// Set the patch fields on the first record matching the filter.
    fn update(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        patch: &Document,
    ) -> GazetteerResult<UpdateOutcome>;

    /// Delete the first record matching the filter. Returns the number deleted.
    fn delete(&self, collection: &str, filter: &DocumentFilter) -> GazetteerResult<u64>;

    /// Accept a raw identifier string if it is well-formed for this store.
    fn parse_identifier(&self, raw: &str) -> Option<Identifier>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

type Collection = BTreeMap<Identifier, Document>;

/// In-memory document store.
///
/// Identifiers are UUIDv7 strings, so iteration order follows insertion
/// order. `set_available(false)` makes every call fail with
/// [`StoreError::Unavailable`], simulating a lost connection.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    available: AtomicBool,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated connectivity.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Clear all stored data.
    pub fn clear(&self) -> GazetteerResult<()> {
        self.write()?.clear();
        Ok(())
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> GazetteerResult<usize> {
        Ok(self.read()?.get(collection).map_or(0, Collection::len))
    }

    /// Insert a document under a caller-chosen identifier, bypassing any
    /// normalization. Used to seed raw data.
    pub fn insert_raw(
        &self,
        collection: &str,
        id: Identifier,
        document: Document,
    ) -> GazetteerResult<()> {
        self.check_available()?;
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id, strip_id(document));
        Ok(())
    }

    fn check_available(&self) -> GazetteerResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            }
            .into())
        }
    }

    fn read(&self) -> GazetteerResult<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| StoreError::LockPoisoned.into())
    }

    fn write(&self) -> GazetteerResult<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| StoreError::LockPoisoned.into())
    }
}

/// The identifier lives beside the document, never inside it.
fn strip_id(mut document: Document) -> Document {
    document.remove(ID_FIELD);
    document
}

fn first_match<'a>(
    collection: &'a Collection,
    filter: &DocumentFilter,
) -> Option<(&'a Identifier, &'a Document)> {
    match filter {
        DocumentFilter::Id(id) => collection.get_key_value(id),
        DocumentFilter::Fields(_) => collection
            .iter()
            .find(|(id, fields)| filter.matches_document(id, fields)),
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn create(&self, collection: &str, document: &Document) -> GazetteerResult<InsertOutcome> {
        self.check_available()?;
        let id = Identifier::generate();
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), strip_id(document.clone()));
        Ok(InsertOutcome {
            inserted_id: Some(id),
        })
    }

    fn read_all(&self, collection: &str, include_identifier: bool) -> GazetteerResult<Vec<Record>> {
        self.check_available()?;
        let collections = self.read()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .map(|(id, fields)| {
                if include_identifier {
                    Record::new(id.clone(), fields.clone())
                } else {
                    Record::anonymous(fields.clone())
                }
            })
            .collect())
    }

    fn read_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> GazetteerResult<Option<Record>> {
        self.check_available()?;
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| first_match(docs, filter))
            .map(|(id, fields)| Record::new(id.clone(), fields.clone())))
    }

    fn update(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        patch: &Document,
    ) -> GazetteerResult<UpdateOutcome> {
        self.check_available()?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(UpdateOutcome { matched_count: 0 });
        };
        let Some(id) = first_match(docs, filter).map(|(id, _)| id.clone()) else {
            return Ok(UpdateOutcome { matched_count: 0 });
        };
        if let Some(fields) = docs.get_mut(&id) {
            for (name, value) in patch {
                if name != ID_FIELD {
                    fields.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(UpdateOutcome { matched_count: 1 })
    }

    fn delete(&self, collection: &str, filter: &DocumentFilter) -> GazetteerResult<u64> {
        self.check_available()?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match first_match(docs, filter).map(|(id, _)| id.clone()) {
            Some(id) => {
                docs.remove(&id);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn parse_identifier(&self, raw: &str) -> Option<Identifier> {
        Uuid::parse_str(raw).ok().map(|_| Identifier::new(raw))
    }
}

// ============================================================================
// TESTS
// ============================================================================
