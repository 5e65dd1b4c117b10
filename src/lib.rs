//! aerostore - document collections over an embedded ordered key-value engine
//!
//! Documents are serde values keyed by a unique string identity. Each
//! collection lives in its own engine: an append-only, checksummed commit
//! log replayed into an ordered, multi-versioned in-memory keyspace. Reads
//! go through cursors pinned to the commit current when they were opened.

pub mod cli;
pub mod codec;
pub mod collection;
pub mod document;
pub mod engine;
pub mod observability;
pub mod selector;
pub mod store;
