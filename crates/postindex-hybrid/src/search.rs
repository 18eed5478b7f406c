use futures::join;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

use postindex_core::fusion::fuse;
use postindex_core::types::{
    DocumentUri, EmbeddingMetadata, FusedResult, MetadataFilter, QueryOptions, RankedList, VectorId,
};
use postindex_core::{Error, Result};

use crate::orchestrator::RetrievalOrchestrator;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Documents to return; the configured default when unset.
    pub top_k: Option<usize>,
    /// Equality filter on vector metadata. Not applied to keyword results.
    pub filter: MetadataFilter,
    /// Document left out of the results, e.g. the one being compared against.
    pub exclude_uri: Option<DocumentUri>,
}

impl SearchOptions {
    pub fn top_k(top_k: usize) -> Self {
        Self { top_k: Some(top_k), ..Self::default() }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    pub fn excluding(mut self, uri: impl Into<DocumentUri>) -> Self {
        self.exclude_uri = Some(uri.into());
        self
    }
}

/// One document in a semantic result list, scored by its best chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub uri: DocumentUri,
    /// Vector that produced the score.
    pub id: VectorId,
    pub score: f32,
    pub metadata: EmbeddingMetadata,
}

impl RetrievalOrchestrator {
    /// Documents nearest to `query`, best first, at most one hit per document.
    #[instrument(skip(self, query, options), fields(query_chars = query.len()))]
    pub async fn search_similar(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        if self.requested(options) == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_one(query).await?;
        self.search_by_vector(&vector, options).await
    }

    /// Documents nearest to the stored vector of `uri`, excluding `uri` itself.
    /// Empty when the document has no stored vectors.
    #[instrument(skip(self, options))]
    pub async fn similar_to_document(&self, uri: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let entries = self.store.get_post_vectors(uri).await?;
        let anchor = entries
            .iter()
            .find(|e| e.metadata.chunk_index.unwrap_or(0) == 0)
            .or_else(|| entries.first());
        let Some(anchor) = anchor else {
            debug!("no stored vectors for document");
            return Ok(Vec::new());
        };
        let options = options.clone().excluding(uri);
        self.search_by_vector(&anchor.values, &options).await
    }

    /// Reciprocal rank fusion over caller-assembled lists.
    pub fn fuse_rankings(&self, lists: &[RankedList], k: Option<usize>) -> Vec<FusedResult> {
        fuse(lists, k.unwrap_or(self.fusion_k))
    }

    /// Keyword and semantic document rankings fused with RRF.
    ///
    /// Both rankings are taken `top_k * overfetch` documents deep. Without a
    /// keyword source, or when it fails, the result is the semantic ranking
    /// alone rescored by fusion.
    #[instrument(skip(self, query, options))]
    pub async fn hybrid_search(&self, query: &str, options: &SearchOptions) -> Result<Vec<FusedResult>> {
        let top_k = self.requested(options);
        if top_k == 0 {
            return Ok(Vec::new());
        }
        // Both sources are ranked to the same depth before fusion.
        let depth = top_k.saturating_mul(self.overfetch);
        let keyword = async {
            match &self.keyword {
                Some(keyword) => Some(keyword.search(query, depth).await),
                None => None,
            }
        };
        let semantic_options = SearchOptions { top_k: Some(depth), ..options.clone() };
        let (semantic, keyword) = join!(self.search_similar(query, &semantic_options), keyword);

        let mut lists: Vec<RankedList> = Vec::with_capacity(2);
        let semantic: RankedList = semantic?.into_iter().map(|hit| hit.uri).collect();
        match keyword {
            Some(Ok(mut uris)) => {
                if let Some(exclude) = &options.exclude_uri {
                    uris.retain(|uri| uri != exclude);
                }
                if let Some(existing) = self.existing(&uris).await? {
                    uris.retain(|uri| existing.contains(uri));
                }
                uris.truncate(depth);
                lists.push(uris);
            }
            Some(Err(e)) => warn!(error = %Error::KeywordSearch(e), "falling back to semantic ranking"),
            None => {}
        }
        lists.push(semantic);

        let mut fused = fuse(&lists, self.fusion_k);
        fused.truncate(top_k);
        Ok(fused)
    }

    fn requested(&self, options: &SearchOptions) -> usize {
        options.top_k.unwrap_or(self.top_k)
    }

    /// Over-fetches chunk matches, collapses them per document and drops
    /// documents the upstream store no longer knows.
    async fn search_by_vector(&self, vector: &[f32], options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let top_k = self.requested(options);
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query = QueryOptions { top_k: top_k.saturating_mul(self.overfetch), filter: options.filter.clone() };
        let mut matches = self.store.query(vector, &query).await?;
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for m in matches {
            let Some(metadata) = m.metadata else {
                debug!(id = %m.id, "match without metadata skipped");
                continue;
            };
            if options.exclude_uri.as_deref() == Some(metadata.uri.as_str()) {
                continue;
            }
            if seen.insert(metadata.uri.clone()) {
                hits.push(SearchHit { uri: metadata.uri.clone(), id: m.id, score: m.score, metadata });
            }
        }

        let uris: Vec<DocumentUri> = hits.iter().map(|h| h.uri.clone()).collect();
        if let Some(existing) = self.existing(&uris).await? {
            let before = hits.len();
            hits.retain(|h| existing.contains(&h.uri));
            if hits.len() < before {
                debug!(dropped = before - hits.len(), "dropped hits for deleted documents");
            }
        }
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn existing(&self, uris: &[DocumentUri]) -> Result<Option<HashSet<DocumentUri>>> {
        let Some(documents) = &self.documents else {
            return Ok(None);
        };
        if uris.is_empty() {
            return Ok(Some(HashSet::new()));
        }
        let existing = documents.existing(uris).await.map_err(Error::DocumentStore)?;
        Ok(Some(existing))
    }
}
