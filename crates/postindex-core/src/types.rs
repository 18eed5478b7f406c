//! Domain types shared by the embedding, vector and hybrid crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable logical identifier of a document (an AT-URI or similar).
pub type DocumentUri = String;
/// Byte-bounded storage key addressing one embedding in the vector store.
pub type VectorId = String;
/// One retrieval source's result ids, best match first.
pub type RankedList = Vec<String>;
/// Metadata equality filter, passed through to the store.
pub type MetadataFilter = BTreeMap<String, String>;

/// Small record stored next to every vector.
///
/// `uri` and `author_did` are always present. `title` is display-only and
/// capped in length; `chunk_index`/`chunk_count` describe the vector's place
/// in its document's ChunkSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingMetadata {
    pub uri: DocumentUri,
    pub author_did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
}

impl EmbeddingMetadata {
    pub fn new(uri: impl Into<String>, author_did: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            author_did: author_did.into(),
            title: None,
            chunk_index: None,
            chunk_count: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Value of a filterable field by its wire name.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "uri" => Some(self.uri.clone()),
            "authorDid" => Some(self.author_did.clone()),
            "title" => self.title.clone(),
            "chunkIndex" => self.chunk_index.map(|i| i.to_string()),
            "chunkCount" => self.chunk_count.map(|n| n.to_string()),
            _ => None,
        }
    }

    /// True when every filter entry equals the corresponding field.
    pub fn matches(&self, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.field(key).as_deref() == Some(value.as_str()))
    }

    /// Copy with the title cut to at most `max_chars` characters.
    pub fn truncated(&self, max_chars: usize) -> Self {
        let mut out = self.clone();
        if let Some(title) = out.title.as_mut() {
            let cut = truncate_chars(title, max_chars).len();
            title.truncate(cut);
        }
        out
    }
}

/// One row submitted to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: VectorId,
    pub values: Vec<f32>,
    pub metadata: EmbeddingMetadata,
}

/// Nearest-neighbour candidate returned by a store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: VectorId,
    pub score: f32,
    pub metadata: Option<EmbeddingMetadata>,
}

/// Store query parameters. `filter` is forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub top_k: usize,
    #[serde(default)]
    pub filter: MetadataFilter,
}

impl QueryOptions {
    pub fn top_k(top_k: usize) -> Self {
        Self { top_k, filter: MetadataFilter::new() }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}

/// Fused rank entry. Higher `score` is better; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: String,
    pub score: f64,
}

/// Prefix of `text` holding at most `max_chars` characters, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
