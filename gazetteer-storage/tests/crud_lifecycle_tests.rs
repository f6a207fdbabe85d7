//! CRUD Controller Lifecycle Tests
//!
//! End-to-end behavior of a cities-like controller keyed by (name, state)
//! over a call-counting store:
//! - Create, repeat, update, select, delete
//! - Idempotent and rejected duplicate creates
//! - Validation failures never reach the store
//! - Store failures propagate unchanged

use std::sync::Arc;

use gazetteer_storage::{CrudController, DocumentStore};
use gazetteer_test_utils::{
    assertions, fixtures, generators, init_test_tracing, CacheConfig, CountingStore,
    GazetteerError, StoreError, ValidationError,
};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// HELPERS
// ============================================================================

fn setup() -> (Arc<CountingStore>, CrudController<CountingStore>) {
    init_test_tracing();
    let store = Arc::new(CountingStore::in_memory());
    let controller = fixtures::city_controller(Arc::clone(&store), CacheConfig::new());
    (store, controller)
}

// ============================================================================
// END-TO-END
// ============================================================================

#[test]
fn test_city_lifecycle() {
    let (store, cities) = setup();

    let id = cities
        .create(
            &fixtures::doc(json!({"name": "New York", "state": "NY", "nation": "USA"})),
            false,
        )
        .unwrap();

    let again = cities
        .create(&fixtures::doc(json!({"name": "new york", "state": "ny"})), true)
        .unwrap();
    assert_eq!(id, again);
    assert_eq!(cities.length().unwrap(), 1);

    cities
        .update(
            id.as_str(),
            &fixtures::doc(json!({"nation": "United States"})),
        )
        .unwrap();
    let record = cities.select(id.as_str()).unwrap();
    assert_eq!(record.get_str("nation"), Some("United States"));
    assert_eq!(record.get_str("name"), Some("new york"));

    cities.delete(id.as_str()).unwrap();
    assert_eq!(cities.length().unwrap(), 0);
    assertions::assert_not_found(&cities.select(id.as_str()));
    assertions::assert_cache_coherent(&cities, store.inner());
}

#[test]
fn test_every_mutation_reloads_once() {
    let (store, cities) = setup();

    let id = cities.create(&fixtures::sample_city(), false).unwrap();
    // Lazy load for the duplicate check, then the write-through reload.
    assert_eq!(store.counts().read_all, 2);
    assert_eq!(cities.stats().reloads, 2);

    cities
        .update(id.as_str(), &fixtures::doc(json!({"population": 1.0})))
        .unwrap();
    assert_eq!(store.counts().read_all, 3);

    cities.delete(id.as_str()).unwrap();
    assert_eq!(store.counts().read_all, 4);
    assert_eq!(store.counts().mutations(), 3);
}

// ============================================================================
// DUPLICATES
// ============================================================================

#[test]
fn test_recursive_create_is_idempotent() {
    let (store, cities) = setup();
    let first = cities.create(&fixtures::sample_city(), true).unwrap();
    let second = cities.create(&fixtures::sample_city(), true).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.counts().create, 1);
    assert_eq!(cities.count().unwrap(), 1);
}

#[test]
fn test_duplicate_create_makes_no_store_mutation() {
    let (store, cities) = setup();
    cities.create(&fixtures::sample_city(), false).unwrap();
    store.reset_counts();

    let result = cities.create(&fixtures::sample_city(), false);
    assertions::assert_duplicate(&result);
    assert_eq!(store.counts().mutations(), 0);
    assert_eq!(store.inner().count("cities").unwrap(), 1);
}

#[test]
fn test_same_name_different_state_is_distinct() {
    let (_, cities) = setup();
    let springfield_il = cities
        .create(&fixtures::doc(json!({"name": "Springfield", "state": "IL"})), false)
        .unwrap();
    let springfield_ma = cities
        .create(&fixtures::doc(json!({"name": "Springfield", "state": "MA"})), false)
        .unwrap();
    assert_ne!(springfield_il, springfield_ma);
    assert_eq!(cities.count().unwrap(), 2);
}

#[test]
fn test_update_onto_existing_key_is_not_rejected() {
    let (store, cities) = setup();
    cities
        .create(&fixtures::doc(json!({"name": "Portland", "state": "OR"})), false)
        .unwrap();
    let maine = cities
        .create(&fixtures::doc(json!({"name": "Bangor", "state": "ME"})), false)
        .unwrap();

    cities
        .update(
            maine.as_str(),
            &fixtures::doc(json!({"name": " PORTLAND", "state": "or "})),
        )
        .unwrap();

    assert_eq!(store.inner().count("cities").unwrap(), 2);
    let snapshot = cities.read().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(cities
        .select_by_key(&[json!("portland"), json!("or")])
        .is_ok());
    assertions::assert_cache_coherent(&cities, store.inner());
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_type_mismatch_makes_no_store_call() {
    let (store, cities) = setup();
    let result = cities.create(
        &fixtures::doc(json!({"name": "X", "population": "not-a-number"})),
        false,
    );
    match result {
        Err(GazetteerError::Validation(ValidationError::TypeMismatch { field, .. })) => {
            assert_eq!(field, "population");
        }
        other => panic!("Expected TypeMismatch, got: {:?}", other),
    }
    assert_eq!(store.counts().total(), 0);
}

#[test]
fn test_integer_does_not_satisfy_float() {
    let (store, cities) = setup();
    let result = cities.create(
        &fixtures::doc(json!({"name": "X", "state": "Y", "population": 5})),
        false,
    );
    assertions::assert_validation_error(&result);
    assert_eq!(store.counts().total(), 0);
}

#[test]
fn test_missing_key_makes_no_store_call() {
    let (store, cities) = setup();
    let result = cities.create(&fixtures::doc(json!({"name": "Boston"})), true);
    assertions::assert_missing_key(&result, "state");
    assert_eq!(store.counts().total(), 0);
}

#[test]
fn test_malformed_identifier_makes_no_store_call() {
    let (store, cities) = setup();
    assertions::assert_validation_error(&cities.select("12345"));
    assertions::assert_validation_error(
        &cities.update("12345", &fixtures::doc(json!({"nation": "x"}))),
    );
    assertions::assert_validation_error(&cities.delete("12345"));
    assert_eq!(store.counts().total(), 0);
}

#[test]
fn test_empty_patch_makes_no_store_call() {
    let (store, cities) = setup();
    let id = cities.create(&fixtures::sample_city(), false).unwrap();
    store.reset_counts();

    let result = cities.update(id.as_str(), &fixtures::doc(json!({"mayor": "someone"})));
    assertions::assert_validation_error(&result);
    assert_eq!(store.counts().total(), 0);
}

// ============================================================================
// STORE FAILURES
// ============================================================================

#[test]
fn test_store_failure_propagates_unchanged() {
    let (store, cities) = setup();
    let id = cities.create(&fixtures::sample_city(), false).unwrap();
    store.set_failing(true);

    match cities.delete(id.as_str()) {
        Err(GazetteerError::Store(StoreError::Backend { collection, reason })) => {
            assert_eq!(collection, "cities");
            assert_eq!(reason, "injected failure");
        }
        other => panic!("Expected Backend error, got: {:?}", other),
    }
    // One attempt, no retries.
    assert_eq!(store.counts().delete, 1);
}

#[test]
fn test_missing_inserted_id_is_store_error() {
    let (store, cities) = setup();
    store.set_drop_inserted_ids(true);
    let result = cities.create(&fixtures::sample_city(), false);
    match result {
        Err(GazetteerError::Store(StoreError::MissingInsertedId { collection })) => {
            assert_eq!(collection, "cities");
        }
        other => panic!("Expected MissingInsertedId, got: {:?}", other),
    }
}

#[test]
fn test_failing_store_rejects_create_on_warm_cache() {
    let (store, cities) = setup();
    cities.read().unwrap();
    store.set_failing(true);
    assertions::assert_store_error(&cities.create(&fixtures::sample_city(), false));
    store.set_failing(false);
    assert_eq!(cities.count().unwrap(), 0);
}

#[test]
fn test_recursive_create_recovers_id_after_failed_reload() {
    let (store, cities) = setup();
    cities.read().unwrap();

    store.set_failing_scans(true);
    assertions::assert_store_error(&cities.create(&fixtures::sample_city(), false));
    assert_eq!(store.inner().count("cities").unwrap(), 1);

    store.set_failing_scans(false);
    cities.cache().reload().unwrap();
    let id = cities.create(&fixtures::sample_city(), true).unwrap();
    let persisted = store.inner().read_all("cities", true).unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id.as_ref(), Some(&id));
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Creating the same natural key twice, in any case and padding, yields
    /// one record and one identifier.
    #[test]
    fn prop_recursive_create_idempotent(
        (raw_name, canonical) in generators::arb_raw_name(),
        state in generators::arb_name(),
    ) {
        let (store, cities) = setup();
        let first = cities
            .create(&fixtures::doc(json!({"name": canonical, "state": state})), true)
            .unwrap();
        let second = cities
            .create(&fixtures::doc(json!({"name": raw_name, "state": state})), true)
            .unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(store.inner().count("cities").unwrap(), 1);
    }

    /// Every generated city is stored with normalized key fields.
    #[test]
    fn prop_created_city_is_selectable_by_key(fields in generators::arb_city_fields()) {
        let (store, cities) = setup();
        let id = cities.create(&fields, false).unwrap();
        let by_key = cities
            .select_by_key(&[fields["name"].clone(), fields["state"].clone()])
            .unwrap();
        prop_assert_eq!(by_key.id.as_ref(), Some(&id));
        let by_id = store.read_one("cities", &gazetteer_test_utils::DocumentFilter::by_id(id)).unwrap();
        prop_assert!(by_id.is_some());
    }
}
