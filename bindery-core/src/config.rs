//! Runtime configuration and the static catalog.
//!
//! Both are loaded once at startup from JSON and handed to the
//! [`World`](crate::world::World), which passes the catalog to factories
//! through their [`FactoryContext`](crate::factory::FactoryContext).
//!
//! ```json
//! {
//!   "runtime": { "max_propagation_depth": 128 },
//!   "catalog": [
//!     { "id": 1, "name": "Lava", "attributes": { "glow": 0.8 } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BindError, Result};
use crate::reactive::DEFAULT_MAX_DEPTH;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeSettings,
    pub catalog: Vec<CatalogEntry>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(BindError::external)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Knobs for propagation and scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Nested propagation steps allowed before a chain is treated as a cycle.
    pub max_propagation_depth: usize,
    /// Remove deleted entities from the arena at the end of every tick.
    pub sweep_deleted: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_propagation_depth: DEFAULT_MAX_DEPTH,
            sweep_deleted: true,
        }
    }
}

/// One catalog record, e.g. a material or cell state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl CatalogEntry {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Read-only lookup over the configured catalog entries, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: IndexMap<u32, CatalogEntry>,
}

impl Catalog {
    /// Later entries with a repeated id replace earlier ones.
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&CatalogEntry> {
        self.entries.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.values().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.runtime, RuntimeSettings::default());
        assert_eq!(config.runtime.max_propagation_depth, DEFAULT_MAX_DEPTH);
        assert!(config.catalog.is_empty());
    }

    #[test]
    fn parses_catalog_and_partial_settings() {
        let config = Config::from_json_str(
            r#"{
                "runtime": { "max_propagation_depth": 32 },
                "catalog": [
                    { "id": 1, "name": "Lava", "attributes": { "glow": 0.8 } },
                    { "id": 2, "name": "Empty" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.runtime.max_propagation_depth, 32);
        assert!(config.runtime.sweep_deleted);

        let catalog = Catalog::new(config.catalog);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.by_name("Lava").unwrap().id, 1);
        assert_eq!(
            catalog.get(1).unwrap().attribute("glow").and_then(Value::as_f64),
            Some(0.8)
        );
        assert!(catalog.get(2).unwrap().attributes.is_empty());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json_str("{ runtime: }").unwrap_err();
        assert!(matches!(err, BindError::Config(_)));
    }

    #[test]
    fn missing_file_is_external() {
        let err = Config::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BindError::External(_)));
    }

    #[test]
    fn serializes_back() {
        let config = Config::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(Config::from_json_str(&json).unwrap(), config);
    }
}
