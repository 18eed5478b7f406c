//! Seams to the external collaborators.
//!
//! Implementations talk to remote services and report failures as
//! `anyhow::Error`; the adapters in `postindex-embed` and `postindex-vector`
//! tag those failures with the sub-operation that produced them.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::types::{DocumentUri, QueryOptions, VectorEntry, VectorId, VectorMatch};

/// Remote embedding model: one vector per input text, same order.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Remote nearest-neighbour index.
#[async_trait]
pub trait VectorStoreService: Send + Sync {
    /// Insert or overwrite entries by id.
    async fn upsert(&self, entries: &[VectorEntry]) -> anyhow::Result<()>;
    async fn query(&self, vector: &[f32], options: &QueryOptions) -> anyhow::Result<Vec<VectorMatch>>;
    /// One slot per requested id, `None` where nothing is stored.
    async fn get_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<Vec<Option<VectorEntry>>>;
    /// Returns how many of `ids` were actually removed.
    async fn delete_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<usize>;
}

/// Keyword index producing document URIs, best match first.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<DocumentUri>>;
}

/// Upstream document store, the authority on which documents still exist.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn existing(&self, uris: &[DocumentUri]) -> anyhow::Result<HashSet<DocumentUri>>;
}
