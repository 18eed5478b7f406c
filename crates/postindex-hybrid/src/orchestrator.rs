use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use postindex_core::chunker::Chunker;
use postindex_core::config::RetrievalConfig;
use postindex_core::identity::{derive_all_ids, derive_base_id};
use postindex_core::traits::{DocumentStore, EmbeddingService, KeywordSearch, VectorStoreService};
use postindex_core::types::{truncate_chars, DocumentUri, EmbeddingMetadata, VectorEntry};
use postindex_core::Result;
use postindex_embed::EmbeddingClient;
use postindex_vector::VectorStoreAdapter;

/// Outcome of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub uri: DocumentUri,
    /// Vectors written for the new version; 0 for a blank document.
    pub chunks: usize,
    /// Vectors of the previous version that no longer apply.
    pub stale_removed: usize,
}

/// Owns the lifecycle of a document's vectors.
///
/// Calls for the same URI must be serialized by the caller; nothing here
/// orders concurrent index and remove operations on one document.
pub struct RetrievalOrchestrator {
    pub(crate) embedder: EmbeddingClient,
    pub(crate) store: VectorStoreAdapter,
    pub(crate) chunker: Chunker,
    pub(crate) keyword: Option<Arc<dyn KeywordSearch>>,
    pub(crate) documents: Option<Arc<dyn DocumentStore>>,
    pub(crate) fusion_k: usize,
    pub(crate) top_k: usize,
    pub(crate) overfetch: usize,
    pub(crate) title_max_chars: usize,
}

impl RetrievalOrchestrator {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStoreService>,
        config: &RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embedder: EmbeddingClient::new(embedding, &config.embedding),
            store: VectorStoreAdapter::new(store, config),
            chunker: Chunker::new(&config.chunking, config.max_chunks),
            keyword: None,
            documents: None,
            fusion_k: config.fusion.k,
            top_k: config.search.top_k,
            overfetch: config.search.overfetch,
            title_max_chars: config.store.title_max_chars,
        })
    }

    pub fn with_keyword_search(mut self, keyword: Arc<dyn KeywordSearch>) -> Self {
        self.keyword = Some(keyword);
        self
    }

    /// Search results are checked against `documents` before they are returned.
    pub fn with_document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn vector_store(&self) -> &VectorStoreAdapter {
        &self.store
    }

    /// Chunks, embeds and upserts `text` under `uri`, then clears chunk ids
    /// the new version no longer uses.
    ///
    /// The title, when set, is prepended to the first segment; that segment
    /// is cut shorter so the prefixed text still fits the embedding input.
    /// A single segment is stored under the base id. Blank text removes the
    /// document's vectors instead. Any error leaves earlier sub-batches
    /// applied; re-running the call is safe.
    #[instrument(skip(self, text, metadata), fields(chars = text.len()))]
    pub async fn index_document(
        &self,
        uri: &str,
        text: &str,
        metadata: EmbeddingMetadata,
    ) -> Result<IndexReport> {
        derive_base_id(uri)?;
        let prefix = metadata
            .title
            .as_deref()
            .map(|t| truncate_chars(t.trim(), self.title_max_chars))
            .filter(|t| !t.is_empty())
            .map(|t| format!("{t}\n\n"))
            .filter(|p| p.chars().count() < self.chunker.max_chars());
        let reserve = prefix.as_ref().map_or(0, |p| p.chars().count());
        let segments = self.chunker.split_with_head_reserve(text, reserve);
        if segments.is_empty() {
            warn!("document has no indexable text, removing its vectors");
            let removed = self.store.delete_post_vectors(uri).await?;
            return Ok(IndexReport { uri: uri.to_string(), chunks: 0, stale_removed: removed });
        }

        let count = segments.len();
        let mut inputs = segments;
        if let Some(prefix) = prefix {
            inputs[0].insert_str(0, &prefix);
        }
        let vectors = self.embedder.embed_many(&inputs).await?;

        let ids = derive_all_ids(uri, count)?;
        let entries: Vec<VectorEntry> = ids
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (id, values))| {
                let mut metadata = metadata.clone();
                metadata.uri = uri.to_string();
                metadata.chunk_index = Some(index);
                metadata.chunk_count = Some(count);
                VectorEntry { id, values, metadata }
            })
            .collect();
        self.store.upsert_many(entries).await?;

        let all_ids = derive_all_ids(uri, self.store.max_chunks())?;
        let stale = all_ids.get(count..).unwrap_or_default();
        let stale_removed = if stale.is_empty() { 0 } else { self.store.delete_by_ids(stale).await? };

        info!(chunks = count, stale_removed, "indexed document");
        Ok(IndexReport { uri: uri.to_string(), chunks: count, stale_removed })
    }

    /// Like [`index_document`](Self::index_document), but a failure is logged
    /// and reported as `false`. An unindexed document degrades search only.
    pub async fn try_index_document(&self, uri: &str, text: &str, metadata: EmbeddingMetadata) -> bool {
        match self.index_document(uri, text, metadata).await {
            Ok(_) => true,
            Err(e) => {
                error!(uri, error = %e, retryable = e.is_retryable(), "indexing failed, document left unindexed");
                false
            }
        }
    }

    /// Deletes the base vector and every possible chunk vector of `uri`.
    #[instrument(skip(self))]
    pub async fn remove_document(&self, uri: &str) -> Result<usize> {
        self.store.delete_post_vectors(uri).await
    }
}
