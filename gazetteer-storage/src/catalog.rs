//! The reference-data entities.
//!
//! Each entity is a [`CrudController`] over its own collection of a shared
//! store. Build the [`Catalog`] once and pass it by handle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use gazetteer_core::{
    AttributeSchema, CacheConfig, ConfigError, FieldType, GazetteerResult, CACHE_TTL_ENV,
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::controller::CrudController;
use crate::DocumentStore;

// ============================================================================
// COLLECTIONS AND FIELDS
// ============================================================================

pub const NATIONS: &str = "nations";
pub const STATES: &str = "states";
pub const CITIES: &str = "cities";
pub const NATURAL_DISASTERS: &str = "natural_disasters";

pub const NAME: &str = "name";
pub const NATION: &str = "nation";
pub const STATE: &str = "state";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const TYPE: &str = "type";
pub const DATE: &str = "date";
pub const LOCATION: &str = "location";
pub const DESCRIPTION: &str = "description";

pub const NATION_KEY: [&str; 1] = [NAME];
pub const STATE_KEY: [&str; 1] = [NAME];
pub const CITY_KEY: [&str; 2] = [NAME, STATE];
pub const DISASTER_KEY: [&str; 3] = [NAME, DATE, LOCATION];

pub fn nation_schema() -> AttributeSchema {
    AttributeSchema::new().field(NAME, FieldType::String)
}

pub fn state_schema() -> AttributeSchema {
    AttributeSchema::new()
        .field(NAME, FieldType::String)
        .field(NATION, FieldType::String)
}

pub fn city_schema() -> AttributeSchema {
    AttributeSchema::new()
        .field(NAME, FieldType::String)
        .field(STATE, FieldType::String)
        .field(NATION, FieldType::String)
        .field(LATITUDE, FieldType::Float)
        .field(LONGITUDE, FieldType::Float)
}

pub fn disaster_schema() -> AttributeSchema {
    AttributeSchema::new()
        .field(NAME, FieldType::String)
        .field(TYPE, FieldType::String)
        .field(DATE, FieldType::String)
        .field(LOCATION, FieldType::String)
        .field(DESCRIPTION, FieldType::String)
        .field(LATITUDE, FieldType::Float)
        .field(LONGITUDE, FieldType::Float)
}

/// Kinds of natural disaster recorded in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterKind {
    Earthquake,
    Landslide,
    Tsunami,
    Hurricane,
}

impl DisasterKind {
    pub const ALL: [DisasterKind; 4] = [
        Self::Earthquake,
        Self::Landslide,
        Self::Tsunami,
        Self::Hurricane,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earthquake => "earthquake",
            Self::Landslide => "landslide",
            Self::Tsunami => "tsunami",
            Self::Hurricane => "hurricane",
        }
    }

    /// Parse a wire string, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for DisasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Cache settings for every entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub nations: CacheConfig,
    pub states: CacheConfig,
    pub cities: CacheConfig,
    pub natural_disasters: CacheConfig,
}

impl CatalogConfig {
    /// Use the same cache settings for every entity.
    pub fn uniform(config: CacheConfig) -> Self {
        Self {
            nations: config.clone(),
            states: config.clone(),
            cities: config.clone(),
            natural_disasters: config,
        }
    }

    /// Load from the environment.
    ///
    /// `GAZETTEER_CACHE_TTL_SECS` sets the default TTL;
    /// `GAZETTEER_<ENTITY>_CACHE_TTL_SECS` overrides it per entity, e.g.
    /// `GAZETTEER_NATURAL_DISASTERS_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = CacheConfig::from_ttl_setting(CACHE_TTL_ENV, lookup(CACHE_TTL_ENV).as_deref())?;
        let entity = |collection: &str| -> Result<CacheConfig, ConfigError> {
            let var = entity_ttl_env(collection);
            match lookup(&var) {
                Some(raw) if !raw.trim().is_empty() => {
                    CacheConfig::from_ttl_setting(&var, Some(&raw))
                }
                _ => Ok(default.clone()),
            }
        };

        let config = Self {
            nations: entity(NATIONS)?,
            states: entity(STATES)?,
            cities: entity(CITIES)?,
            natural_disasters: entity(NATURAL_DISASTERS)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.nations.validate()?;
        self.states.validate()?;
        self.cities.validate()?;
        self.natural_disasters.validate()
    }
}

/// Name of the per-entity TTL override variable.
pub fn entity_ttl_env(collection: &str) -> String {
    format!("GAZETTEER_{}_CACHE_TTL_SECS", collection.to_ascii_uppercase())
}

// ============================================================================
// CATALOG
// ============================================================================

/// The four reference entities over one store.
#[derive(Debug)]
pub struct Catalog<S: DocumentStore> {
    pub nations: CrudController<S>,
    pub states: CrudController<S>,
    pub cities: CrudController<S>,
    pub natural_disasters: CrudController<S>,
}

impl<S: DocumentStore> Catalog<S> {
    pub fn new(store: Arc<S>, config: &CatalogConfig) -> GazetteerResult<Self> {
        Ok(Self {
            nations: CrudController::new(
                Arc::clone(&store),
                NATIONS,
                &NATION_KEY,
                nation_schema(),
                config.nations.clone(),
            )?,
            states: CrudController::new(
                Arc::clone(&store),
                STATES,
                &STATE_KEY,
                state_schema(),
                config.states.clone(),
            )?,
            cities: CrudController::new(
                Arc::clone(&store),
                CITIES,
                &CITY_KEY,
                city_schema(),
                config.cities.clone(),
            )?,
            natural_disasters: CrudController::new(
                store,
                NATURAL_DISASTERS,
                &DISASTER_KEY,
                disaster_schema(),
                config.natural_disasters.clone(),
            )?,
        })
    }

    /// Cache statistics keyed by collection.
    pub fn stats(&self) -> BTreeMap<&'static str, CacheStats> {
        BTreeMap::from([
            (NATIONS, self.nations.stats()),
            (STATES, self.states.stats()),
            (CITIES, self.cities.stats()),
            (NATURAL_DISASTERS, self.natural_disasters.stats()),
        ])
    }

    /// Reload every entity cache from the store.
    pub fn reload_all(&self) -> GazetteerResult<()> {
        self.nations.cache().reload()?;
        self.states.cache().reload()?;
        self.cities.cache().reload()?;
        self.natural_disasters.cache().reload()?;
        Ok(())
    }
}
