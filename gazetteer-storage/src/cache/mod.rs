//! Composite-key read-through cache.
//!
//! Each [`CompositeKeyCache`] indexes one collection by a caller-chosen tuple
//! of key fields. The index is an immutable [`Snapshot`] rebuilt wholesale from
//! the document store; there is no incremental invalidation.
//!
//! # Consistency
//!
//! A reload scans the full collection, builds the new map, and only then
//! swaps it in. Readers hold an `Arc` to whichever snapshot was current when
//! they asked, so they observe either the previous complete map or the new
//! complete map, never a partially built one.
//!
//! Staleness is bounded by the optional TTL, checked lazily on read, and by
//! the write-through reload the CRUD controller performs after every
//! successful mutation.
//!
//! # Example
//!
//! ```ignore
//! let cache = CompositeKeyCache::new(store, "cities", &["name", "state"], &CacheConfig::new())?;
//!
//! // Lazily loads on first access
//! let snapshot = cache.read()?;
//!
//! // Counts a hit or a miss
//! let city = cache.get(&[json!("new york"), json!("ny")])?;
//! ```

pub mod composite;
pub mod stats;

pub use composite::{CompositeKeyCache, FlatView, Snapshot};
pub use stats::CacheStats;
