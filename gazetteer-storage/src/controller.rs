//! Generic CRUD controller over one collection.
//!
//! A [`CrudController`] pairs an [`EntitySchema`] with a
//! [`CompositeKeyCache`] over the same collection. Creates are deduplicated
//! on the natural key through the cache; updates, deletes and selects are
//! addressed by the store identifier. Every successful mutation is followed
//! by a full cache reload.
//!
//! Duplicate detection reads the cache and then writes, so two concurrent
//! writers can both insert the same natural key. Writers to one collection
//! must be serialized by the caller.

use std::sync::Arc;

use gazetteer_core::{
    AttributeSchema, CacheConfig, Clock, CompositeKey, Document, DocumentFilter, EntitySchema,
    GazetteerError, GazetteerResult, Identifier, Record, StoreError, ValidationError,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheStats, CompositeKeyCache, FlatView, Snapshot};
use crate::DocumentStore;

/// Schema-validated, cache-backed CRUD over one collection.
#[derive(Debug)]
pub struct CrudController<S: DocumentStore> {
    store: Arc<S>,
    schema: EntitySchema,
    cache: CompositeKeyCache<S>,
}

impl<S: DocumentStore> CrudController<S> {
    /// Build a controller.
    ///
    /// Fails if the key fields are empty, repeated, or not declared in
    /// `attributes`, or if `config` is invalid.
    pub fn new<K: AsRef<str>>(
        store: Arc<S>,
        collection: impl Into<String>,
        key_fields: &[K],
        attributes: AttributeSchema,
        config: CacheConfig,
    ) -> GazetteerResult<Self> {
        let schema = EntitySchema::new(attributes, key_fields)?;
        let cache =
            CompositeKeyCache::new(Arc::clone(&store), collection, schema.key_fields(), &config)?;
        Ok(Self {
            store,
            schema,
            cache,
        })
    }

    /// Replace the clock the cache uses for TTL checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = self.cache.with_clock(clock);
        self
    }

    pub fn collection(&self) -> &str {
        self.cache.collection()
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn cache(&self) -> &CompositeKeyCache<S> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Insert a record unless one with the same natural key exists.
    ///
    /// With `recursive` set, an existing record's identifier is returned
    /// instead of failing with [`GazetteerError::Duplicate`]. Either way the
    /// store is not written when the key is already present.
    ///
    /// If the store accepts the insert but the following cache reload fails,
    /// the error is returned and the new identifier is not. The record is
    /// persisted regardless; once the store is reachable again a `recursive`
    /// create with the same fields returns its identifier.
    pub fn create(&self, fields: &Document, recursive: bool) -> GazetteerResult<Identifier> {
        let (document, key) = self.prepare(fields)?;

        let snapshot = self.cache.read()?;
        if let Some(existing) = snapshot.get(&key) {
            debug!(
                collection = %self.collection(),
                key = %key,
                recursive,
                "Create short-circuited on existing key"
            );
            if !recursive {
                return Err(GazetteerError::Duplicate {
                    collection: self.collection().to_string(),
                    key,
                });
            }
            return existing.id.clone().ok_or_else(|| {
                StoreError::MissingRecordId {
                    collection: self.collection().to_string(),
                }
                .into()
            });
        }
        drop(snapshot);

        let outcome = self.store.create(self.collection(), &document)?;
        let id = outcome.inserted_id.ok_or_else(|| StoreError::MissingInsertedId {
            collection: self.collection().to_string(),
        })?;
        self.cache.reload()?;

        info!(collection = %self.collection(), id = %id, key = %key, "Record created");
        Ok(id)
    }

    /// The existing record sharing the natural key of `fields`, if any.
    pub fn find_duplicate(&self, fields: &Document) -> GazetteerResult<Option<Record>> {
        let (_, key) = self.prepare(fields)?;
        Ok(self.cache.read()?.get(&key).cloned())
    }

    /// Number of cached records.
    pub fn count(&self) -> GazetteerResult<usize> {
        Ok(self.cache.read()?.len())
    }

    /// Alias of [`CrudController::count`].
    pub fn length(&self) -> GazetteerResult<usize> {
        self.count()
    }

    /// The full snapshot, keyed by composite key.
    pub fn read(&self) -> GazetteerResult<Arc<Snapshot>> {
        self.cache.read()
    }

    pub fn read_flat(&self) -> GazetteerResult<FlatView> {
        self.cache.read_flat()
    }

    /// Fetch one record from the store by identifier.
    pub fn select(&self, identifier: &str) -> GazetteerResult<Record> {
        let id = self.parse_identifier(identifier)?;
        self.store
            .read_one(self.collection(), &DocumentFilter::by_id(id))?
            .ok_or_else(|| self.not_found(identifier))
    }

    /// Fetch one record from the cache by natural key values.
    ///
    /// String values for string key fields are normalized first, so
    /// `[" New York", "NY"]` finds the record stored as `("new york", "ny")`.
    pub fn select_by_key(&self, key_values: &[Value]) -> GazetteerResult<Record> {
        let key = self.schema.key_from_values(key_values)?;
        self.cache
            .get_key(&key)?
            .ok_or_else(|| self.not_found(&key.to_string()))
    }

    /// Set the declared fields present in `fields` on the identified record.
    ///
    /// Key strings are re-normalized. Null values and undeclared fields are
    /// skipped. No duplicate check is made against other records.
    pub fn update(&self, identifier: &str, fields: &Document) -> GazetteerResult<()> {
        let id = self.parse_identifier(identifier)?;
        self.schema.validate(fields)?;
        self.log_undeclared(fields);

        let patch = self.schema.project(fields);
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch {
                collection: self.collection().to_string(),
            }
            .into());
        }

        let outcome = self
            .store
            .update(self.collection(), &DocumentFilter::by_id(id), &patch)?;
        if outcome.matched_count == 0 {
            return Err(self.not_found(identifier));
        }
        self.cache.reload()?;

        info!(
            collection = %self.collection(),
            id = %identifier,
            fields = ?patch.keys().collect::<Vec<_>>(),
            "Record updated"
        );
        Ok(())
    }

    /// Delete the identified record.
    pub fn delete(&self, identifier: &str) -> GazetteerResult<()> {
        let id = self.parse_identifier(identifier)?;
        let deleted = self
            .store
            .delete(self.collection(), &DocumentFilter::by_id(id))?;
        if deleted == 0 {
            return Err(self.not_found(identifier));
        }
        self.cache.reload()?;

        info!(collection = %self.collection(), id = %identifier, "Record deleted");
        Ok(())
    }

    /// Validate, project and key a create input.
    fn prepare(&self, fields: &Document) -> GazetteerResult<(Document, CompositeKey)> {
        self.schema.validate(fields)?;
        self.log_undeclared(fields);

        let document = self.schema.project(fields);
        if let Some(field) = self.schema.first_missing_key(&document) {
            return Err(GazetteerError::MissingKey {
                collection: self.collection().to_string(),
                field: field.to_string(),
            });
        }
        let key = self.schema.key_of(&document);
        Ok((document, key))
    }

    fn log_undeclared(&self, fields: &Document) {
        let ignored = self.schema.undeclared(fields);
        if !ignored.is_empty() {
            debug!(collection = %self.collection(), ?ignored, "Ignoring undeclared fields");
        }
    }

    fn parse_identifier(&self, raw: &str) -> GazetteerResult<Identifier> {
        self.store.parse_identifier(raw).ok_or_else(|| {
            ValidationError::InvalidIdentifier {
                raw: raw.to_string(),
            }
            .into()
        })
    }

    fn not_found(&self, target: &str) -> GazetteerError {
        GazetteerError::NotFound {
            collection: self.collection().to_string(),
            target: target.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryDocumentStore;
    use gazetteer_core::FieldType;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn cities(store: &Arc<InMemoryDocumentStore>) -> CrudController<InMemoryDocumentStore> {
        let attributes = AttributeSchema::new()
            .field("name", FieldType::String)
            .field("state", FieldType::String)
            .field("nation", FieldType::String)
            .field("population", FieldType::Float);
        CrudController::new(
            Arc::clone(store),
            "cities",
            &["name", "state"],
            attributes,
            CacheConfig::new(),
        )
        .unwrap()
    }

    fn new_york() -> Document {
        doc(json!({"name": "New York", "state": "NY", "nation": "USA"}))
    }

    #[test]
    fn test_new_rejects_key_outside_schema() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let err = CrudController::new(
            store,
            "cities",
            &["name", "county"],
            AttributeSchema::new().field("name", FieldType::String),
            CacheConfig::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GazetteerError::Validation(ValidationError::UnknownKeyField {
                field: "county".to_string()
            })
        );
    }

    #[test]
    fn test_create_normalizes_key_fields() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let id = controller.create(&new_york(), false).unwrap();

        let record = controller.select(id.as_str()).unwrap();
        assert_eq!(record.get_str("name"), Some("new york"));
        assert_eq!(record.get_str("state"), Some("ny"));
        assert_eq!(record.get_str("nation"), Some("USA"));
    }

    #[test]
    fn test_create_recursive_returns_existing_id() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let first = controller.create(&new_york(), true).unwrap();
        let again = controller
            .create(&doc(json!({"name": " new york ", "state": "ny"})), true)
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(controller.count().unwrap(), 1);
        assert_eq!(store.count("cities").unwrap(), 1);
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        controller.create(&new_york(), false).unwrap();
        let err = controller.create(&new_york(), false).unwrap_err();
        assert!(matches!(err, GazetteerError::Duplicate { .. }));
        assert_eq!(err.status_code(), 409);
        assert_eq!(store.count("cities").unwrap(), 1);
    }

    #[test]
    fn test_create_missing_key() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let err = controller
            .create(&doc(json!({"name": "Boston", "state": null})), false)
            .unwrap_err();
        assert_eq!(
            err,
            GazetteerError::MissingKey {
                collection: "cities".to_string(),
                field: "state".to_string()
            }
        );
    }

    #[test]
    fn test_validation_happens_before_store_calls() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        store.set_available(false);

        let err = controller
            .create(
                &doc(json!({"name": "X", "state": "Y", "population": "not-a-number"})),
                false,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GazetteerError::Validation(ValidationError::TypeMismatch { .. })
        ));

        let err = controller.select("not-an-id").unwrap_err();
        assert!(matches!(
            err,
            GazetteerError::Validation(ValidationError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_create_drops_undeclared_fields() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let mut input = new_york();
        input.insert("mayor".to_string(), json!("someone"));
        let id = controller.create(&input, false).unwrap();
        let record = controller.select(id.as_str()).unwrap();
        assert!(record.get("mayor").is_none());
    }

    #[test]
    fn test_select_by_key_normalizes() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let id = controller.create(&new_york(), false).unwrap();

        let record = controller
            .select_by_key(&[json!("  NEW YORK"), json!("Ny")])
            .unwrap();
        assert_eq!(record.id, Some(id));

        let err = controller
            .select_by_key(&[json!("boston"), json!("ma")])
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(controller.stats().hits, 1);
        assert_eq!(controller.stats().misses, 1);
    }

    #[test]
    fn test_find_duplicate() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        assert!(controller.find_duplicate(&new_york()).unwrap().is_none());
        let id = controller.create(&new_york(), false).unwrap();
        let existing = controller.find_duplicate(&new_york()).unwrap().unwrap();
        assert_eq!(existing.id, Some(id));
    }

    #[test]
    fn test_update_refreshes_cache() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let id = controller.create(&new_york(), false).unwrap();

        controller
            .update(id.as_str(), &doc(json!({"nation": "United States"})))
            .unwrap();

        let cached = controller
            .select_by_key(&[json!("new york"), json!("ny")])
            .unwrap();
        assert_eq!(cached.get_str("nation"), Some("United States"));
    }

    #[test]
    fn test_update_renormalizes_key() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let id = controller.create(&new_york(), false).unwrap();
        controller
            .update(id.as_str(), &doc(json!({"state": " N.Y. "})))
            .unwrap();
        let record = controller.select(id.as_str()).unwrap();
        assert_eq!(record.get_str("state"), Some("n.y."));
    }

    #[test]
    fn test_update_empty_patch_rejected() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let id = controller.create(&new_york(), false).unwrap();
        let err = controller
            .update(id.as_str(), &doc(json!({"mayor": "someone"})))
            .unwrap_err();
        assert_eq!(
            err,
            GazetteerError::Validation(ValidationError::EmptyPatch {
                collection: "cities".to_string()
            })
        );
    }

    #[test]
    fn test_update_and_delete_unknown_id() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let ghost = Identifier::generate();

        let err = controller
            .update(ghost.as_str(), &doc(json!({"nation": "x"})))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = controller.delete(ghost.as_str()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_delete_refreshes_cache() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        let id = controller.create(&new_york(), false).unwrap();
        assert_eq!(controller.length().unwrap(), 1);

        controller.delete(id.as_str()).unwrap();
        assert_eq!(controller.length().unwrap(), 0);
        assert!(controller.select(id.as_str()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_flat_is_composite_for_cities() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        controller.create(&new_york(), false).unwrap();
        assert!(matches!(
            controller.read_flat().unwrap(),
            FlatView::Composite(_)
        ));
    }

    #[test]
    fn test_store_failure_propagates() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = cities(&store);
        store.set_available(false);
        let err = controller.create(&new_york(), false).unwrap_err();
        assert!(matches!(
            err,
            GazetteerError::Store(StoreError::Unavailable { .. })
        ));
        assert_eq!(err.status_code(), 500);
    }
}
