//! Backend registry
//!
//! Maps backend names to factories. The registry is a plain value built by
//! the entry point and passed to whoever opens stores; there is no global
//! table.

use std::collections::HashMap;
use std::fmt;

use super::config::{StoreConfig, LOCAL_BACKEND};
use super::errors::{StoreError, StoreResult};
use super::local::LocalStore;
use super::DataStore;

/// Builds a store from its configuration.
pub type StoreFactory = Box<dyn Fn(&StoreConfig) -> StoreResult<Box<dyn DataStore>> + Send + Sync>;

#[derive(Default)]
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Registry with no backends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `local` backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(LOCAL_BACKEND, |config| {
            Ok(Box::new(LocalStore::open(config)?) as Box<dyn DataStore>)
        });
        registry
    }

    /// Registers `factory` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&StoreConfig) -> StoreResult<Box<dyn DataStore>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validates `config` and opens the backend it names.
    pub fn open(&self, config: &StoreConfig) -> StoreResult<Box<dyn DataStore>> {
        config.validate()?;

        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| StoreError::UnknownBackend {
                backend: config.backend.clone(),
            })?;
        factory(config)
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}
