use std::sync::Arc;
use tracing::{debug, info, instrument};

use postindex_core::config::RetrievalConfig;
use postindex_core::identity::{derive_all_ids, derive_base_id, MAX_VECTOR_ID_BYTES};
use postindex_core::traits::VectorStoreService;
use postindex_core::types::{EmbeddingMetadata, QueryOptions, VectorEntry, VectorId, VectorMatch};
use postindex_core::{Error, Result, StoreOp};

/// Client-side guard rails around a remote vector store.
///
/// Validation happens before any network call. Batched operations issue one
/// store call per sub-batch, sequentially; a failure reports the sub-batch
/// index and earlier sub-batches stay applied.
#[derive(Clone)]
pub struct VectorStoreAdapter {
    store: Arc<dyn VectorStoreService>,
    dimension: usize,
    batch_size: usize,
    max_chunks: usize,
    title_max_chars: usize,
}

impl VectorStoreAdapter {
    pub fn new(store: Arc<dyn VectorStoreService>, config: &RetrievalConfig) -> Self {
        Self {
            store,
            dimension: config.dimension,
            batch_size: config.store.upsert_batch_size.max(1),
            max_chunks: config.max_chunks.max(1),
            title_max_chars: config.store.title_max_chars,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    pub async fn upsert_one(&self, id: VectorId, values: Vec<f32>, metadata: EmbeddingMetadata) -> Result<()> {
        self.upsert_many(vec![VectorEntry { id, values, metadata }]).await?;
        Ok(())
    }

    /// All-or-nothing validation, then one store call per sub-batch.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn upsert_many(&self, mut entries: Vec<VectorEntry>) -> Result<usize> {
        for entry in &entries {
            self.check_id(&entry.id)?;
            self.check_dimension(&entry.id, &entry.values)?;
        }
        if entries.is_empty() {
            return Ok(0);
        }
        for entry in &mut entries {
            entry.metadata = entry.metadata.truncated(self.title_max_chars);
        }
        for (batch, chunk) in entries.chunks(self.batch_size).enumerate() {
            debug!(batch, size = chunk.len(), "upserting sub-batch");
            self.store
                .upsert(chunk)
                .await
                .map_err(|e| Error::store(StoreOp::Upsert, batch, e))?;
        }
        Ok(entries.len())
    }

    /// Returns how many ids were removed; ids that never existed are not an error.
    #[instrument(skip_all, fields(ids = ids.len()))]
    pub async fn delete_by_ids(&self, ids: &[VectorId]) -> Result<usize> {
        let mut removed = 0usize;
        for (batch, chunk) in ids.chunks(self.batch_size).enumerate() {
            removed += self
                .store
                .delete_by_ids(chunk)
                .await
                .map_err(|e| Error::store(StoreOp::Delete, batch, e))?;
        }
        Ok(removed)
    }

    /// Clears the base vector and every possible chunk vector of `uri`.
    #[instrument(skip(self))]
    pub async fn delete_post_vectors(&self, uri: &str) -> Result<usize> {
        let ids = derive_all_ids(uri, self.max_chunks)?;
        let removed = self.delete_by_ids(&ids).await?;
        info!(removed, "deleted document vectors");
        Ok(removed)
    }

    /// Up to `top_k` nearest matches, filter forwarded verbatim.
    pub async fn query(&self, vector: &[f32], options: &QueryOptions) -> Result<Vec<VectorMatch>> {
        self.check_dimension("<query>", vector)?;
        if options.top_k == 0 {
            return Ok(Vec::new());
        }
        let mut matches = self
            .store
            .query(vector, options)
            .await
            .map_err(|e| Error::store(StoreOp::Query, 0, e))?;
        matches.truncate(options.top_k);
        Ok(matches)
    }

    /// Entries that exist among `ids`, in request order.
    pub async fn get_by_ids(&self, ids: &[VectorId]) -> Result<Vec<VectorEntry>> {
        let mut found = Vec::new();
        for (batch, chunk) in ids.chunks(self.batch_size).enumerate() {
            let slots = self
                .store
                .get_by_ids(chunk)
                .await
                .map_err(|e| Error::store(StoreOp::Get, batch, e))?;
            found.extend(slots.into_iter().flatten());
        }
        Ok(found)
    }

    /// Stored vectors of one document.
    ///
    /// Reads the base id first. A hit whose metadata records more than one
    /// chunk pulls the remaining chunk ids too. A miss means the document was
    /// never stored under its base id, so the chunk range is fetched instead
    /// and whatever subset exists is returned. This assumes a document never
    /// holds a standalone base vector and an unrelated chunk set at once.
    #[instrument(skip(self))]
    pub async fn get_post_vectors(&self, uri: &str) -> Result<Vec<VectorEntry>> {
        let base_id = derive_base_id(uri)?;
        let base = self.get_by_ids(std::slice::from_ref(&base_id)).await?.into_iter().next();
        match base {
            Some(base) => {
                let count = base.metadata.chunk_count.unwrap_or(1).min(self.max_chunks);
                if count <= 1 {
                    return Ok(vec![base]);
                }
                let ids = derive_all_ids(uri, count)?;
                let mut entries = vec![base];
                entries.extend(self.get_by_ids(&ids[1..]).await?);
                Ok(entries)
            }
            None => {
                debug!("base vector missing, falling back to chunk ids");
                let ids = derive_all_ids(uri, self.max_chunks)?;
                self.get_by_ids(&ids[1..]).await
            }
        }
    }

    fn check_dimension(&self, id: &str, values: &[f32]) -> Result<()> {
        if values.len() != self.dimension {
            return Err(Error::InvalidDimension {
                id: id.to_string(),
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(())
    }

    fn check_id(&self, id: &str) -> Result<()> {
        if id.is_empty() || id.len() > MAX_VECTOR_ID_BYTES {
            return Err(Error::IdentityDerivation(format!(
                "vector id '{id}' must be 1..={MAX_VECTOR_ID_BYTES} bytes"
            )));
        }
        Ok(())
    }
}
