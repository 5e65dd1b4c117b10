//! Store subsystem
//!
//! A store owns a set of named collections under one base location.
//! Backends are reached through the [`DataStore`] trait and selected by
//! name through a [`StoreRegistry`].

mod config;
mod errors;
mod local;
mod registry;

pub use config::{StoreConfig, LOCAL_BACKEND};
pub use errors::{StoreError, StoreResult};
pub use local::{LocalStore, COLLECTION_NAME_PATTERN};
pub use registry::{StoreFactory, StoreRegistry};

use std::path::PathBuf;

use serde::Serialize;

use crate::collection::{Collection, CollectionError, OpContext};

/// Snapshot of store state reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub backend: String,
    pub path: PathBuf,
    /// RFC 3339 time the store was opened
    pub opened_at: String,
    /// Collections with an engine currently open, sorted
    pub open_collections: Vec<String>,
    pub closed: bool,
}

pub trait DataStore: Send + Sync {
    /// Registered name of this backend.
    fn backend(&self) -> &'static str;

    /// Provisions a new, empty collection.
    fn create_collection(&self, ctx: &OpContext, name: &str) -> StoreResult<Collection>;

    /// Opens an existing collection.
    fn collection(&self, ctx: &OpContext, name: &str) -> StoreResult<Collection>;

    fn collection_exists(&self, ctx: &OpContext, name: &str) -> bool;

    fn status(&self, ctx: &OpContext) -> StoreResult<StoreStatus>;

    /// Closes every open collection. Idempotent.
    fn close(&self, ctx: &OpContext) -> StoreResult<()>;
}

pub(crate) fn check_context(ctx: &OpContext) -> StoreResult<()> {
    ctx.check().map_err(|e| match e {
        CollectionError::Cancelled { reason } => StoreError::Cancelled { reason },
        other => StoreError::Cancelled {
            reason: other.to_string(),
        },
    })
}
