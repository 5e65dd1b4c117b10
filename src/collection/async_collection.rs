//! Async facade over [`Collection`]
//!
//! Storage calls block on disk I/O, so each one runs on tokio's blocking
//! pool. A blocking task that panics or is aborted surfaces as an engine
//! failure.

use std::io;

use serde::de::DeserializeOwned;
use tokio::task::{self, JoinError};

use crate::codec::{Codec, JsonCodec};
use crate::document::{Document, WriteResult};
use crate::engine::EngineError;
use crate::selector::{Expr, Fields};

use super::collection::Collection;
use super::context::OpContext;
use super::errors::{CollectionError, CollectionResult};

#[derive(Clone)]
pub struct AsyncCollection<C: Codec = JsonCodec> {
    inner: Collection<C>,
}

fn join_failure(err: JoinError) -> CollectionError {
    CollectionError::Engine(EngineError::io(
        "blocking storage task failed",
        io::Error::new(io::ErrorKind::Other, err.to_string()),
    ))
}

impl<C: Codec> AsyncCollection<C> {
    pub fn new(inner: Collection<C>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Collection<C> {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> CollectionResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Collection<C>) -> CollectionResult<T> + Send + 'static,
    {
        let coll = self.inner.clone();
        task::spawn_blocking(move || op(coll))
            .await
            .map_err(join_failure)?
    }

    pub async fn create<D>(&self, ctx: &OpContext, doc: D) -> CollectionResult<WriteResult>
    where
        D: Document + Send + 'static,
    {
        let ctx = ctx.clone();
        self.run(move |coll| coll.create(&ctx, &doc)).await
    }

    pub async fn get<T>(&self, ctx: &OpContext, id: &str) -> CollectionResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let ctx = ctx.clone();
        let id = id.to_string();
        self.run(move |coll| coll.get(&ctx, &id)).await
    }

    pub async fn update<D>(&self, ctx: &OpContext, doc: D) -> CollectionResult<()>
    where
        D: Document + Send + 'static,
    {
        let ctx = ctx.clone();
        self.run(move |coll| coll.update(&ctx, &doc)).await
    }

    pub async fn delete(&self, ctx: &OpContext, id: &str) -> CollectionResult<()> {
        let ctx = ctx.clone();
        let id = id.to_string();
        self.run(move |coll| coll.delete(&ctx, &id)).await
    }

    pub async fn bulk_update<D>(&self, ctx: &OpContext, docs: Vec<D>) -> CollectionResult<()>
    where
        D: Document + Send + 'static,
    {
        let ctx = ctx.clone();
        self.run(move |coll| coll.bulk_update(&ctx, &docs)).await
    }

    pub async fn count(&self, ctx: &OpContext) -> CollectionResult<u64> {
        let ctx = ctx.clone();
        self.run(move |coll| coll.count(&ctx)).await
    }

    /// Runs `select`, decodes every match and closes the cursor.
    pub async fn select_all<T>(
        &self,
        ctx: &OpContext,
        selector: Expr,
        fields: Fields,
    ) -> CollectionResult<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let ctx = ctx.clone();
        self.run(move |coll| {
            let mut cursor = coll.select(&ctx, &selector, &fields)?;
            let docs = cursor.collect_all();
            cursor.close()?;
            docs
        })
        .await
    }
}

impl<C: Codec> From<Collection<C>> for AsyncCollection<C> {
    fn from(inner: Collection<C>) -> Self {
        Self::new(inner)
    }
}
