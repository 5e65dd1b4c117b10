//! Collection subsystem
//!
//! A collection is a named set of documents keyed by identity, stored in
//! one engine instance. This module provides the blocking collection
//! contract, cursors over query results, per-call operation contexts and
//! an async facade for tokio callers.

mod async_collection;
#[allow(clippy::module_inception)]
mod collection;
mod context;
mod cursor;
mod errors;

pub use async_collection::AsyncCollection;
pub use collection::{Collection, QueryableCollection, ENGINE_TYPE};
pub use context::OpContext;
pub use cursor::{Cursor, Documents, DEFAULT_PREFETCH_SIZE};
pub use errors::{CollectionError, CollectionResult};
