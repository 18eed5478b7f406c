use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::identity::{fits_key_limit, DEFAULT_MAX_CHUNKS};

/// Environment prefix; nested keys use `__`, e.g. `APP_RETRIEVAL_EMBEDDING__BATCH_SIZE`.
pub const ENV_PREFIX: &str = "APP_RETRIEVAL_";

/// Service limits and tuning knobs for the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Expected embedding dimensionality.
    pub dimension: usize,
    /// Chunk cap per document, also the range cleared on delete.
    pub max_chunks: usize,
    pub embedding: EmbeddingConfig,
    pub store: VectorStoreConfig,
    pub chunking: ChunkingConfig,
    pub fusion: FusionConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub batch_size: usize,
    pub max_input_chars: usize,
    /// Sub-batches in flight at once; 1 issues them sequentially.
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub upsert_batch_size: usize,
    pub title_max_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Matches fetched per requested result before chunk hits are collapsed.
    pub overfetch: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dimension: 1024,
            max_chunks: DEFAULT_MAX_CHUNKS,
            embedding: EmbeddingConfig::default(),
            store: VectorStoreConfig::default(),
            chunking: ChunkingConfig::default(),
            fusion: FusionConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { batch_size: 50, max_input_chars: 2000, concurrency: 1 }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self { upsert_batch_size: 100, title_max_chars: 200 }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 2000 }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { k: crate::fusion::DEFAULT_RRF_K }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 10, overfetch: 3 }
    }
}

impl RetrievalConfig {
    /// Defaults overridden by `APP_RETRIEVAL_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Base figment callers can merge their own providers into.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Defaults, then the TOML file at `path` if it exists, then the environment.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dimension", self.dimension),
            ("max_chunks", self.max_chunks),
            ("embedding.batch_size", self.embedding.batch_size),
            ("embedding.max_input_chars", self.embedding.max_input_chars),
            ("embedding.concurrency", self.embedding.concurrency),
            ("store.upsert_batch_size", self.store.upsert_batch_size),
            ("chunking.max_chars", self.chunking.max_chars),
            ("search.overfetch", self.search.overfetch),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("'{key}' must be greater than zero")));
            }
        }
        if self.chunking.max_chars > self.embedding.max_input_chars {
            return Err(Error::InvalidConfig(format!(
                "chunking.max_chars ({}) exceeds embedding.max_input_chars ({})",
                self.chunking.max_chars, self.embedding.max_input_chars
            )));
        }
        if !fits_key_limit(self.max_chunks) {
            return Err(Error::InvalidConfig(format!(
                "max_chunks {} produces vector ids over the key limit",
                self.max_chunks
            )));
        }
        Ok(())
    }
}
