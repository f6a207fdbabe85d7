//! The composite-key cache and its snapshots.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use gazetteer_core::{
    CacheConfig, Clock, CompositeKey, GazetteerResult, KeyPart, Record, SystemClock, Timestamp,
    ValidationError,
};
use serde_json::Value;
use tracing::{debug, warn};

use super::stats::CacheStats;
use crate::DocumentStore;

/// An immutable, fully built index of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<CompositeKey, Record>,
    loaded_at: Timestamp,
}

impl Snapshot {
    pub fn get(&self, key: &CompositeKey) -> Option<&Record> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &Record)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.entries.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.values()
    }

    pub fn entries(&self) -> &BTreeMap<CompositeKey, Record> {
        &self.entries
    }

    /// When this snapshot was built.
    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }
}

/// The cached map viewed by scalar key when the cache has a single key field.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatView {
    /// Single key field: the 1-tuple is unwrapped.
    Scalar(BTreeMap<KeyPart, Record>),
    /// Several key fields: the tuple-keyed snapshot unchanged.
    Composite(Arc<Snapshot>),
}

impl FlatView {
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(map) => map.len(),
            Self::Composite(snapshot) => snapshot.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// TTL-bounded in-memory index of one collection, keyed by composite key.
///
/// The map is loaded lazily on first read, reloaded when the TTL has
/// elapsed, and rebuilt in full by [`CompositeKeyCache::reload`]. It is never
/// patched incrementally, so after any reload it equals a fresh scan of the
/// store.
///
/// Scan and publish happen under one reload lock, so a reload that started
/// earlier can never publish over one that started later.
#[derive(Debug)]
pub struct CompositeKeyCache<S: DocumentStore> {
    store: Arc<S>,
    collection: String,
    key_fields: Vec<String>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    reload_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    reloads: AtomicU64,
}

impl<S: DocumentStore> CompositeKeyCache<S> {
    /// Create an empty, unloaded cache over `collection`.
    ///
    /// `key_fields` must be non-empty and free of duplicates.
    pub fn new<K: AsRef<str>>(
        store: Arc<S>,
        collection: impl Into<String>,
        key_fields: &[K],
        config: &CacheConfig,
    ) -> GazetteerResult<Self> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(ValidationError::EmptyCollection.into());
        }
        if key_fields.is_empty() {
            return Err(ValidationError::EmptyKeyFields.into());
        }
        let mut keys: Vec<String> = Vec::with_capacity(key_fields.len());
        for field in key_fields {
            let field = field.as_ref();
            if keys.iter().any(|k| k == field) {
                return Err(ValidationError::DuplicateKeyField {
                    field: field.to_string(),
                }
                .into());
            }
            keys.push(field.to_string());
        }
        config.validate()?;

        Ok(Self {
            store,
            collection,
            key_fields: keys,
            ttl: config.ttl,
            clock: Arc::new(SystemClock),
            snapshot: RwLock::new(None),
            reload_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
        })
    }

    /// Replace the clock used for TTL checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Rebuild the map from a full scan of the collection.
    ///
    /// On store failure the previously published snapshot stays in place.
    pub fn reload(&self) -> GazetteerResult<Arc<Snapshot>> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.scan_and_publish()
    }

    /// Must be called with `reload_lock` held.
    fn scan_and_publish(&self) -> GazetteerResult<Arc<Snapshot>> {
        let started = Instant::now();
        let records = match self.store.read_all(&self.collection, true) {
            Ok(records) => records,
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Cache reload failed");
                return Err(e);
            }
        };

        let mut entries = BTreeMap::new();
        for record in records {
            let key = CompositeKey::from_record(&self.key_fields, &record);
            entries.insert(key, record);
        }
        let snapshot = Arc::new(Snapshot {
            entries,
            loaded_at: self.clock.now(),
        });

        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        self.reloads.fetch_add(1, Ordering::Relaxed);

        debug!(
            collection = %self.collection,
            size = snapshot.len(),
            elapsed = ?started.elapsed(),
            "Cache reloaded"
        );
        Ok(snapshot)
    }

    /// True if never loaded, or loaded longer than the TTL ago.
    pub fn is_expired(&self) -> bool {
        match self.current() {
            Some(snapshot) => self.snapshot_expired(&snapshot),
            None => true,
        }
    }

    /// The current map, loading it first if unloaded or expired.
    pub fn read(&self) -> GazetteerResult<Arc<Snapshot>> {
        if let Some(snapshot) = self.current() {
            if !self.snapshot_expired(&snapshot) {
                return Ok(snapshot);
            }
        }

        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Another thread may have reloaded while we waited.
        if let Some(snapshot) = self.current() {
            if !self.snapshot_expired(&snapshot) {
                return Ok(snapshot);
            }
        }
        self.scan_and_publish()
    }

    /// Look up a record by positional key values.
    ///
    /// Values are compared exactly as given. Counts a hit or a miss.
    pub fn get(&self, key_values: &[Value]) -> GazetteerResult<Option<Record>> {
        if key_values.len() != self.key_fields.len() {
            return Err(ValidationError::KeyArity {
                expected: self.key_fields.len(),
                got: key_values.len(),
            }
            .into());
        }
        self.get_key(&CompositeKey::from_values(key_values))
    }

    /// Look up a record by an already built composite key. Counts a hit or a miss.
    pub fn get_key(&self, key: &CompositeKey) -> GazetteerResult<Option<Record>> {
        if key.arity() != self.key_fields.len() {
            return Err(ValidationError::KeyArity {
                expected: self.key_fields.len(),
                got: key.arity(),
            }
            .into());
        }
        let snapshot = self.read()?;
        match snapshot.get(key) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(record.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let current = self.current();
        CacheStats {
            hits,
            misses,
            reloads: self.reloads.load(Ordering::Relaxed),
            total_requests: hits + misses,
            hit_rate: CacheStats::hit_rate_percent(hits, misses),
            size: current.as_ref().map_or(0, |s| s.len()),
            ttl: self.ttl,
            last_reload: current.as_ref().map(|s| s.loaded_at()),
            is_expired: current
                .as_ref()
                .map_or(true, |s| self.snapshot_expired(s)),
        }
    }

    /// Zero hit and miss counters. The reload counter is kept.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Drop the cached map. Statistics are kept; the next read reloads.
    pub fn clear(&self) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current map keyed by scalar when there is a single key field.
    pub fn read_flat(&self) -> GazetteerResult<FlatView> {
        let snapshot = self.read()?;
        if self.key_fields.len() != 1 {
            return Ok(FlatView::Composite(snapshot));
        }
        let flat = snapshot
            .iter()
            .filter_map(|(key, record)| {
                key.clone()
                    .into_single()
                    .map(|part| (part, record.clone()))
            })
            .collect();
        Ok(FlatView::Scalar(flat))
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn snapshot_expired(&self, snapshot: &Snapshot) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        // A TTL too large for chrono never elapses.
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return false;
        };
        self.clock.now() - snapshot.loaded_at > ttl
    }
}
