//! Document collection over one engine instance
//!
//! # Write path
//!
//! - Create / Update / Delete: one write transaction per call, committed or
//!   discarded before returning
//! - BulkUpdate / CreateMany: every document is validated and encoded first,
//!   then all records go into a single write batch flushed as one commit;
//!   one bad document means nothing is written
//! - Update is a full overwrite, never a merge; Create on an existing id
//!   overwrites as well
//!
//! # Read path
//!
//! - Get: point lookup on a read transaction
//! - All / Select: cursor over the snapshot current at call time
//! - Count: keys-only scan, no stored counter

use serde::de::DeserializeOwned;

use crate::codec::{Codec, JsonCodec};
use crate::document::{required_fields, validate_identity, Document, WriteResult};
use crate::engine::{Engine, EngineError, IteratorOptions, Transaction};
use crate::observability::{log_event_with_fields, Event};
use crate::selector::{compile, Expr, Fields};

use super::context::OpContext;
use super::cursor::{Cursor, DEFAULT_PREFETCH_SIZE};
use super::errors::{CollectionError, CollectionResult};

/// Engine tag reported by `type_name()`
pub const ENGINE_TYPE: &str = "aerolog";

/// Steps between cancellation checks while counting
const COUNT_CHECK_INTERVAL: u64 = 1024;

/// Collections that can serve selector queries.
pub trait QueryableCollection<C: Codec = JsonCodec> {
    fn select(&self, ctx: &OpContext, selector: &Expr, fields: &Fields)
        -> CollectionResult<Cursor<C>>;
}

/// Handle to one named collection. Clones share the same engine.
#[derive(Clone)]
pub struct Collection<C: Codec = JsonCodec> {
    name: String,
    engine: Engine,
    codec: C,
    prefetch_size: usize,
}

impl Collection<JsonCodec> {
    pub fn new(name: impl Into<String>, engine: Engine) -> Self {
        Self::with_codec(name, engine, JsonCodec)
    }
}

impl<C: Codec> Collection<C> {
    pub fn with_codec(name: impl Into<String>, engine: Engine, codec: C) -> Self {
        Self {
            name: name.into(),
            engine,
            codec,
            prefetch_size: DEFAULT_PREFETCH_SIZE,
        }
    }

    /// Sets how many entries cursors buffer per refill (minimum 1).
    pub fn with_prefetch_size(mut self, prefetch_size: usize) -> Self {
        self.prefetch_size = prefetch_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Storage engine tag.
    pub fn type_name(&self) -> &'static str {
        ENGINE_TYPE
    }

    /// Every collection of this engine supports `select`.
    pub fn as_queryable(&self) -> Option<&dyn QueryableCollection<C>> {
        Some(self)
    }

    fn encode<D: Document + ?Sized>(&self, doc: &D) -> CollectionResult<Vec<u8>> {
        self.codec.encode(doc).map_err(CollectionError::Encode)
    }

    /// Inserts `doc`, overwriting any record with the same identity.
    pub fn create<D: Document + ?Sized>(
        &self,
        ctx: &OpContext,
        doc: &D,
    ) -> CollectionResult<WriteResult> {
        ctx.check()?;
        let fields = required_fields(doc)?;
        let value = self.encode(doc)?;

        let mut txn = self.engine.begin(true)?;
        match txn.set(fields.id.as_bytes(), value) {
            Ok(()) => txn.commit()?,
            Err(e) => {
                txn.discard();
                return Err(e.into());
            }
        }

        Ok(WriteResult {
            id: fields.id.to_string(),
        })
    }

    /// Inserts every document as one atomic batch.
    pub fn create_many<D: Document>(
        &self,
        ctx: &OpContext,
        docs: &[D],
    ) -> CollectionResult<Vec<WriteResult>> {
        let ids = self.write_batch(ctx, docs)?;
        Ok(ids.into_iter().map(|id| WriteResult { id }).collect())
    }

    /// Reads the document stored under `id`.
    pub fn get<T: DeserializeOwned>(&self, ctx: &OpContext, id: &str) -> CollectionResult<T> {
        ctx.check()?;
        validate_identity(id)?;

        let txn = self.engine.begin(false)?;
        let read = txn.get(id.as_bytes());
        txn.discard();

        let value = match read {
            Ok(value) => value,
            Err(EngineError::KeyNotFound) => return Err(CollectionError::not_found(id)),
            Err(e) => return Err(e.into()),
        };

        self.codec.decode(&value).map_err(CollectionError::Decode)
    }

    /// Overwrites (or creates) the record for `doc`.
    pub fn update<D: Document + ?Sized>(&self, ctx: &OpContext, doc: &D) -> CollectionResult<()> {
        self.create(ctx, doc).map(|_| ())
    }

    /// Removes the record for `id`. Absent ids are not an error.
    pub fn delete(&self, ctx: &OpContext, id: &str) -> CollectionResult<()> {
        ctx.check()?;
        validate_identity(id)?;

        let mut txn = self.engine.begin(true)?;
        match txn.delete(id.as_bytes()) {
            Ok(()) => txn.commit()?,
            Err(e) => {
                txn.discard();
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Writes every document or none of them.
    pub fn bulk_update<D: Document>(&self, ctx: &OpContext, docs: &[D]) -> CollectionResult<()> {
        self.write_batch(ctx, docs).map(|_| ())
    }

    fn write_batch<D: Document>(&self, ctx: &OpContext, docs: &[D]) -> CollectionResult<Vec<String>> {
        ctx.check()?;

        let mut staged = Vec::with_capacity(docs.len());
        for (index, doc) in docs.iter().enumerate() {
            let prepared = required_fields(doc)
                .and_then(|fields| Ok((fields.id.to_string(), self.encode(doc)?)));

            match prepared {
                Ok(record) => staged.push(record),
                Err(e) => {
                    let index_str = index.to_string();
                    let reason = e.to_string();
                    log_event_with_fields(
                        Event::BatchRejected,
                        &[
                            ("collection", self.name.as_str()),
                            ("index", index_str.as_str()),
                            ("reason", reason.as_str()),
                        ],
                    );
                    return Err(match e {
                        CollectionError::InvalidIdentity { reason } => {
                            CollectionError::invalid_identity(format!(
                                "document {}: {}",
                                index, reason
                            ))
                        }
                        other => other,
                    });
                }
            }
        }

        ctx.check()?;

        let mut batch = self.engine.new_write_batch()?;
        let mut ids = Vec::with_capacity(staged.len());
        for (id, value) in staged {
            batch.set(id.as_bytes(), value);
            ids.push(id);
        }
        let sequence = batch.flush()?;

        let count_str = ids.len().to_string();
        let sequence_str = sequence.to_string();
        log_event_with_fields(
            Event::BatchCommitted,
            &[
                ("collection", self.name.as_str()),
                ("documents", count_str.as_str()),
                ("sequence", sequence_str.as_str()),
            ],
        );

        Ok(ids)
    }

    /// Cursor over the whole collection.
    pub fn all(&self, ctx: &OpContext) -> CollectionResult<Cursor<C>> {
        ctx.check()?;
        Cursor::open(
            &self.engine,
            None,
            self.codec.clone(),
            ctx.clone(),
            self.prefetch_size,
        )
    }

    /// Cursor bounded by the prefix compiled from `selector`.
    ///
    /// `fields` is accepted for interface compatibility; projection is not
    /// applied.
    pub fn select(
        &self,
        ctx: &OpContext,
        selector: &Expr,
        _fields: &Fields,
    ) -> CollectionResult<Cursor<C>> {
        ctx.check()?;
        let prefix = compile(selector)?;
        Cursor::open(
            &self.engine,
            Some(prefix),
            self.codec.clone(),
            ctx.clone(),
            self.prefetch_size,
        )
    }

    /// Number of records, computed by a full keys-only scan.
    pub fn count(&self, ctx: &OpContext) -> CollectionResult<u64> {
        ctx.check()?;

        let txn = self.engine.begin(false)?;
        let counted = count_keys(&txn, ctx);
        txn.discard();
        counted
    }

    /// Checks `id` the same way writes do, without touching storage.
    pub fn validate_id(&self, id: &str) -> CollectionResult<()> {
        validate_identity(id)
    }
}

fn count_keys(txn: &Transaction, ctx: &OpContext) -> CollectionResult<u64> {
    let mut iter = txn.iter(IteratorOptions::keys_only());
    iter.rewind();

    let mut count = 0u64;
    while iter.valid() {
        count += 1;
        if count % COUNT_CHECK_INTERVAL == 0 {
            ctx.check()?;
        }
        iter.next();
    }
    Ok(count)
}

impl<C: Codec> QueryableCollection<C> for Collection<C> {
    fn select(
        &self,
        ctx: &OpContext,
        selector: &Expr,
        fields: &Fields,
    ) -> CollectionResult<Cursor<C>> {
        Collection::select(self, ctx, selector, fields)
    }
}
