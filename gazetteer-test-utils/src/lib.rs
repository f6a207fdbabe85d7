//! Gazetteer Test Utilities
//!
//! Shared test infrastructure for the Gazetteer workspace:
//! - A call-counting, failure-injecting store wrapper
//! - Proptest generators for entity documents
//! - Test fixtures for common scenarios
//! - Custom assertions for Gazetteer errors and cache coherence
//! - Tracing initialization for tests

// Re-export the in-memory store from its source crate
pub use gazetteer_storage::{
    CacheStats, Catalog, CatalogConfig, CompositeKeyCache, CrudController, DisasterKind,
    DocumentStore, InMemoryDocumentStore, InsertOutcome, UpdateOutcome,
};

// Re-export core types for convenience
pub use gazetteer_core::{
    AttributeSchema, CacheConfig, CompositeKey, Document, DocumentFilter, FieldType,
    GazetteerError, GazetteerResult, Identifier, ManualClock, Record, StoreError,
    ValidationError,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// ============================================================================
// TRACING
// ============================================================================

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "gazetteer_core=debug,gazetteer_storage=debug";

/// Set to `json` to emit structured JSON lines instead of plain text.
pub const LOG_FORMAT_ENV: &str = "GAZETTEER_LOG_FORMAT";

/// Install a fmt subscriber writing through the test harness.
///
/// Honors `RUST_LOG` and `GAZETTEER_LOG_FORMAT`. Safe to call from every
/// test; only the first call installs anything.
pub fn init_test_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_test_writer())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init()
    };
}

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Number of calls made to each store primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create: u64,
    pub read_all: u64,
    pub read_one: u64,
    pub update: u64,
    pub delete: u64,
}

impl CallCounts {
    /// Calls that may change stored data.
    pub fn mutations(&self) -> u64 {
        self.create + self.update + self.delete
    }

    pub fn total(&self) -> u64 {
        self.mutations() + self.read_all + self.read_one
    }
}

/// Store wrapper that counts calls per primitive and can inject failures.
///
/// Calls are counted whether or not they fail. `parse_identifier` is not a
/// store round trip and is neither counted nor failed.
#[derive(Debug, Default)]
pub struct CountingStore<S: DocumentStore = InMemoryDocumentStore> {
    inner: S,
    create: AtomicU64,
    read_all: AtomicU64,
    read_one: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
    failing: AtomicBool,
    failing_scans: AtomicBool,
    drop_inserted_ids: AtomicBool,
}

impl CountingStore<InMemoryDocumentStore> {
    /// Wrap a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(InMemoryDocumentStore::new())
    }
}

impl<S: DocumentStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            create: AtomicU64::new(0),
            read_all: AtomicU64::new(0),
            read_one: AtomicU64::new(0),
            update: AtomicU64::new(0),
            delete: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            failing_scans: AtomicBool::new(false),
            drop_inserted_ids: AtomicBool::new(false),
        }
    }

    /// The wrapped store, for seeding and inspection without counting.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn counts(&self) -> CallCounts {
        CallCounts {
            create: self.create.load(Ordering::SeqCst),
            read_all: self.read_all.load(Ordering::SeqCst),
            read_one: self.read_one.load(Ordering::SeqCst),
            update: self.update.load(Ordering::SeqCst),
            delete: self.delete.load(Ordering::SeqCst),
        }
    }

    pub fn reset_counts(&self) {
        for counter in [
            &self.create,
            &self.read_all,
            &self.read_one,
            &self.update,
            &self.delete,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// Make every primitive fail with [`StoreError::Backend`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make only `read_all` fail, so writes land but cache reloads do not.
    pub fn set_failing_scans(&self, failing: bool) {
        self.failing_scans.store(failing, Ordering::SeqCst);
    }

    /// Make `create` persist the document but report no inserted id.
    pub fn set_drop_inserted_ids(&self, drop: bool) {
        self.drop_inserted_ids.store(drop, Ordering::SeqCst);
    }

    fn enter(&self, counter: &AtomicU64, collection: &str) -> GazetteerResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                collection: collection.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl<S: DocumentStore> DocumentStore for CountingStore<S> {
    fn create(&self, collection: &str, document: &Document) -> GazetteerResult<InsertOutcome> {
        self.enter(&self.create, collection)?;
        let mut outcome = self.inner.create(collection, document)?;
        if self.drop_inserted_ids.load(Ordering::SeqCst) {
            outcome.inserted_id = None;
        }
        Ok(outcome)
    }

    fn read_all(&self, collection: &str, include_identifier: bool) -> GazetteerResult<Vec<Record>> {
        self.enter(&self.read_all, collection)?;
        if self.failing_scans.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                collection: collection.to_string(),
                reason: "injected scan failure".to_string(),
            }
            .into());
        }
        self.inner.read_all(collection, include_identifier)
    }

    fn read_one(
        &self,
        collection: &str,
        filter: &DocumentFilter,
    ) -> GazetteerResult<Option<Record>> {
        self.enter(&self.read_one, collection)?;
        self.inner.read_one(collection, filter)
    }

    fn update(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        patch: &Document,
    ) -> GazetteerResult<UpdateOutcome> {
        self.enter(&self.update, collection)?;
        self.inner.update(collection, filter, patch)
    }

    fn delete(&self, collection: &str, filter: &DocumentFilter) -> GazetteerResult<u64> {
        self.enter(&self.delete, collection)?;
        self.inner.delete(collection, filter)
    }

    fn parse_identifier(&self, raw: &str) -> Option<Identifier> {
        self.inner.parse_identifier(raw)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for entity documents.

    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// A place name in canonical form: lower-case, no surrounding whitespace.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[a-z]{1,10}( [a-z]{1,10})?"
    }

    /// A place name with random case and padding that normalizes to `arb_name`.
    pub fn arb_raw_name() -> impl Strategy<Value = (String, String)> {
        (arb_name(), any::<bool>(), 0usize..3, 0usize..3).prop_map(
            |(canonical, upper, left, right)| {
                let cased = if upper {
                    canonical.to_uppercase()
                } else {
                    canonical.clone()
                };
                let raw = format!("{}{}{}", " ".repeat(left), cased, "\t".repeat(right));
                (raw, canonical)
            },
        )
    }

    pub fn arb_latitude() -> impl Strategy<Value = f64> {
        -90.0f64..90.0
    }

    pub fn arb_longitude() -> impl Strategy<Value = f64> {
        -180.0f64..180.0
    }

    pub fn arb_disaster_kind() -> impl Strategy<Value = DisasterKind> {
        prop_oneof![
            Just(DisasterKind::Earthquake),
            Just(DisasterKind::Landslide),
            Just(DisasterKind::Tsunami),
            Just(DisasterKind::Hurricane),
        ]
    }

    /// An ISO-8601 calendar date between 1900 and 2030.
    pub fn arb_date() -> impl Strategy<Value = String> {
        (1900i32..2030, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "1970-01-01".to_string())
        })
    }

    /// City fields matching [`fixtures::city_schema`].
    pub fn arb_city_fields() -> impl Strategy<Value = Document> {
        (
            arb_name(),
            arb_name(),
            arb_name(),
            arb_latitude(),
            arb_longitude(),
        )
            .prop_map(|(name, state, nation, lat, lon)| {
                fixtures::doc(json!({
                    "name": name,
                    "state": state,
                    "nation": nation,
                    "latitude": lat,
                    "longitude": lon,
                }))
            })
    }

    /// Natural disaster fields matching the catalog schema.
    pub fn arb_disaster_fields() -> impl Strategy<Value = Document> {
        (
            arb_name(),
            arb_disaster_kind(),
            arb_date(),
            arb_name(),
            arb_latitude(),
            arb_longitude(),
        )
            .prop_map(|(name, kind, date, location, lat, lon)| {
                fixtures::doc(json!({
                    "name": name,
                    "type": kind.as_str(),
                    "date": date,
                    "location": location,
                    "latitude": lat,
                    "longitude": lon,
                }))
            })
    }

    /// Any JSON scalar.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
            "[a-zA-Z ]{0,12}".prop_map(Value::String),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    pub const CITIES: &str = "cities";
    pub const CITY_KEY: [&str; 2] = ["name", "state"];

    /// Unwrap a JSON object literal into a [`Document`].
    #[track_caller]
    pub fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected a JSON object, got: {}", other),
        }
    }

    /// A cities-like schema with a numeric `population`.
    pub fn city_schema() -> AttributeSchema {
        AttributeSchema::new()
            .field("name", FieldType::String)
            .field("state", FieldType::String)
            .field("nation", FieldType::String)
            .field("population", FieldType::Float)
            .field("latitude", FieldType::Float)
            .field("longitude", FieldType::Float)
    }

    pub fn sample_city() -> Document {
        doc(json!({
            "name": "New York",
            "state": "NY",
            "nation": "USA",
            "population": 8_336_817.0,
            "latitude": 40.7128,
            "longitude": -74.006,
        }))
    }

    /// A city controller over `store`, keyed by (name, state).
    pub fn city_controller<S: DocumentStore>(
        store: Arc<S>,
        config: CacheConfig,
    ) -> CrudController<S> {
        match CrudController::new(store, CITIES, &CITY_KEY, city_schema(), config) {
            Ok(controller) => controller,
            Err(e) => panic!("City fixture failed to build: {:?}", e),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Gazetteer-specific validation.

    use super::*;
    use std::collections::BTreeMap;

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &GazetteerResult<T>) {
        match result {
            Err(GazetteerError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &GazetteerResult<T>) {
        match result {
            Err(GazetteerError::NotFound { .. }) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_duplicate<T: std::fmt::Debug>(result: &GazetteerResult<T>) {
        match result {
            Err(GazetteerError::Duplicate { .. }) => {}
            other => panic!("Expected Duplicate error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_missing_key<T: std::fmt::Debug>(result: &GazetteerResult<T>, field: &str) {
        match result {
            Err(GazetteerError::MissingKey { field: f, .. }) => {
                assert_eq!(f, field, "Wrong field in MissingKey error");
            }
            other => panic!("Expected MissingKey error for {}, got: {:?}", field, other),
        }
    }

    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(result: &GazetteerResult<T>) {
        match result {
            Err(GazetteerError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert the controller's cached map equals a fresh scan of the store.
    #[track_caller]
    pub fn assert_cache_coherent<S: DocumentStore, T: DocumentStore>(
        controller: &CrudController<S>,
        store: &T,
    ) {
        let fresh: BTreeMap<CompositeKey, Record> = match store.read_all(controller.collection(), true)
        {
            Ok(records) => records
                .into_iter()
                .map(|r| (CompositeKey::from_record(controller.schema().key_fields(), &r), r))
                .collect(),
            Err(e) => panic!("Fresh scan failed: {:?}", e),
        };
        match controller.read() {
            Ok(snapshot) => assert_eq!(
                snapshot.entries(),
                &fresh,
                "Cache for {} diverged from the store",
                controller.collection()
            ),
            Err(e) => panic!("Cache read failed: {:?}", e),
        }
    }

    /// Assert hit/miss counters and the derived rate.
    #[track_caller]
    pub fn assert_hit_accounting(stats: &CacheStats, hits: u64, misses: u64) {
        assert_eq!(stats.hits, hits, "hits");
        assert_eq!(stats.misses, misses, "misses");
        assert_eq!(stats.total_requests, hits + misses, "total_requests");
        let expected = if hits + misses == 0 {
            0.0
        } else {
            100.0 * hits as f64 / (hits + misses) as f64
        };
        assert!(
            (stats.hit_rate - expected).abs() < 1e-9,
            "hit_rate {} != {}",
            stats.hit_rate,
            expected
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_sample_city_satisfies_schema() {
        assert!(fixtures::city_schema()
            .validate(&fixtures::sample_city())
            .is_ok());
    }

    #[test]
    fn test_counting_store_counts_each_primitive() {
        let store = CountingStore::in_memory();
        let id = store
            .create("cities", &fixtures::sample_city())
            .unwrap()
            .inserted_id
            .unwrap();
        store.read_all("cities", true).unwrap();
        store
            .read_one("cities", &DocumentFilter::by_id(id.clone()))
            .unwrap();
        store
            .update(
                "cities",
                &DocumentFilter::by_id(id.clone()),
                &fixtures::doc(json!({"nation": "US"})),
            )
            .unwrap();
        store.delete("cities", &DocumentFilter::by_id(id)).unwrap();

        let counts = store.counts();
        assert_eq!(
            counts,
            CallCounts {
                create: 1,
                read_all: 1,
                read_one: 1,
                update: 1,
                delete: 1,
            }
        );
        assert_eq!(counts.mutations(), 3);
        assert_eq!(counts.total(), 5);

        store.reset_counts();
        assert_eq!(store.counts(), CallCounts::default());
    }

    #[test]
    fn test_counting_store_injected_failure() {
        let store = CountingStore::in_memory();
        store.set_failing(true);
        let result = store.read_all("cities", true);
        assertions::assert_store_error(&result);
        assert_eq!(store.counts().read_all, 1);
    }

    #[test]
    fn test_counting_store_drops_inserted_ids() {
        let store = CountingStore::in_memory();
        store.set_drop_inserted_ids(true);
        let outcome = store.create("cities", &fixtures::sample_city()).unwrap();
        assert_eq!(outcome.inserted_id, None);
        assert_eq!(store.inner().count("cities").unwrap(), 1);
    }

    #[test]
    fn test_city_controller_fixture() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let controller = fixtures::city_controller(Arc::clone(&store), CacheConfig::new());
        controller.create(&fixtures::sample_city(), false).unwrap();
        assertions::assert_cache_coherent(&controller, &*store);
    }

    #[test]
    fn test_init_test_tracing_is_reentrant() {
        init_test_tracing();
        init_test_tracing();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_cities_satisfy_schema(fields in generators::arb_city_fields()) {
            prop_assert!(fixtures::city_schema().validate(&fields).is_ok());
        }

        #[test]
        fn prop_raw_names_normalize_to_canonical((raw, canonical) in generators::arb_raw_name()) {
            prop_assert_eq!(gazetteer_core::normalize_str(&raw), canonical);
        }

        #[test]
        fn prop_generated_disasters_have_known_kind(fields in generators::arb_disaster_fields()) {
            let kind = fields.get("type").and_then(|v| v.as_str()).and_then(DisasterKind::parse);
            prop_assert!(kind.is_some());
        }
    }
}
