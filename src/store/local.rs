//! Local directory store
//!
//! Each collection lives in its own engine directory `<base>/<name>`.
//! Engines are opened lazily and cached until the store is closed. With
//! `in_memory` set, collections are kept in the cache only and nothing is
//! written under the base path.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use regex::Regex;

use crate::collection::{Collection, OpContext};
use crate::engine::{Engine, EngineOptions};
use crate::observability::{log_event_with_fields, Event};

use super::config::{StoreConfig, LOCAL_BACKEND};
use super::errors::{StoreError, StoreResult};
use super::{check_context, DataStore, StoreStatus};

/// Collection names: a letter, then up to 31 letters, digits or underscores
pub const COLLECTION_NAME_PATTERN: &str = r"^[A-Za-z][0-9A-Za-z_]{0,31}$";

struct State {
    engines: HashMap<String, Engine>,
    closed: bool,
}

pub struct LocalStore {
    base_path: PathBuf,
    options: EngineOptions,
    prefetch_size: usize,
    name_pattern: Regex,
    opened_at: String,
    state: RwLock<State>,
}

impl LocalStore {
    /// Opens a store rooted at `config.path`, which must be an existing directory.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let base_path = config.path.clone();
        if base_path.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath {
                path: base_path,
                reason: "empty path".to_string(),
            });
        }
        if !base_path.is_dir() {
            return Err(StoreError::InvalidPath {
                path: base_path,
                reason: "not an existing directory".to_string(),
            });
        }

        let name_pattern = Regex::new(COLLECTION_NAME_PATTERN)
            .map_err(|e| StoreError::config(format!("collection name pattern: {}", e)))?;

        let path_str = base_path.display().to_string();
        log_event_with_fields(
            Event::StoreOpened,
            &[("backend", LOCAL_BACKEND), ("path", path_str.as_str())],
        );

        Ok(Self {
            base_path,
            options: config.engine_options(),
            prefetch_size: config.prefetch_size,
            name_pattern,
            opened_at: chrono::Utc::now().to_rfc3339(),
            state: RwLock::new(State {
                engines: HashMap::new(),
                closed: false,
            }),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn validate_name(&self, name: &str) -> StoreResult<()> {
        if !self.name_pattern.is_match(name) {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn wrap(&self, name: &str, engine: Engine) -> Collection {
        Collection::new(name, engine).with_prefetch_size(self.prefetch_size)
    }
}

impl DataStore for LocalStore {
    fn backend(&self) -> &'static str {
        LOCAL_BACKEND
    }

    fn create_collection(&self, ctx: &OpContext, name: &str) -> StoreResult<Collection> {
        check_context(ctx)?;
        self.validate_name(name)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(StoreError::StoreClosed);
        }

        let path = self.collection_path(name);
        if state.engines.contains_key(name) || path.exists() {
            return Err(StoreError::CollectionExists {
                name: name.to_string(),
            });
        }

        if !self.options.in_memory {
            fs::create_dir(&path).map_err(|e| {
                StoreError::io(format!("failed to create collection directory {:?}", path), e)
            })?;
        }

        let engine = Engine::open(&path, self.options)?;
        state.engines.insert(name.to_string(), engine.clone());

        log_event_with_fields(Event::CollectionCreated, &[("collection", name)]);
        Ok(self.wrap(name, engine))
    }

    fn collection(&self, ctx: &OpContext, name: &str) -> StoreResult<Collection> {
        check_context(ctx)?;
        self.validate_name(name)?;

        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.closed {
                return Err(StoreError::StoreClosed);
            }
            if let Some(engine) = state.engines.get(name) {
                return Ok(self.wrap(name, engine.clone()));
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(StoreError::StoreClosed);
        }
        // another caller may have opened it between the two locks
        if let Some(engine) = state.engines.get(name) {
            return Ok(self.wrap(name, engine.clone()));
        }

        let path = self.collection_path(name);
        if self.options.in_memory || !path.is_dir() {
            return Err(StoreError::CollectionNotFound {
                name: name.to_string(),
            });
        }

        let engine = Engine::open(&path, self.options)?;
        state.engines.insert(name.to_string(), engine.clone());

        log_event_with_fields(Event::CollectionOpened, &[("collection", name)]);
        Ok(self.wrap(name, engine))
    }

    fn collection_exists(&self, _ctx: &OpContext, name: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.engines.contains_key(name) {
            return true;
        }
        self.name_pattern.is_match(name) && self.collection_path(name).is_dir()
    }

    fn status(&self, ctx: &OpContext) -> StoreResult<StoreStatus> {
        check_context(ctx)?;

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut open: Vec<String> = state.engines.keys().cloned().collect();
        open.sort();

        Ok(StoreStatus {
            backend: LOCAL_BACKEND.to_string(),
            path: self.base_path.clone(),
            opened_at: self.opened_at.clone(),
            open_collections: open,
            closed: state.closed,
        })
    }

    fn close(&self, _ctx: &OpContext) -> StoreResult<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let engines: BTreeMap<String, Engine> = state.engines.drain().collect();
        let mut first_error = None;
        for (name, engine) in engines {
            if let Err(e) = engine.close() {
                let reason = e.to_string();
                log_event_with_fields(
                    Event::EngineCloseFailed,
                    &[("collection", name.as_str()), ("reason", reason.as_str())],
                );
                first_error.get_or_insert(e);
            }
        }

        let path_str = self.base_path.display().to_string();
        log_event_with_fields(Event::StoreClosed, &[("path", path_str.as_str())]);

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
