use anyhow::anyhow;
use futures::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, instrument};

use postindex_core::config::EmbeddingConfig;
use postindex_core::traits::EmbeddingService;
use postindex_core::types::truncate_chars;
use postindex_core::{Error, Result};

/// Splits input into service-sized sub-batches and reassembles the vectors
/// in submission order.
#[derive(Clone)]
pub struct EmbeddingClient {
    service: Arc<dyn EmbeddingService>,
    batch_size: usize,
    max_input_chars: usize,
    concurrency: usize,
}

impl EmbeddingClient {
    pub fn new(service: Arc<dyn EmbeddingService>, config: &EmbeddingConfig) -> Self {
        Self {
            service,
            batch_size: config.batch_size.max(1),
            max_input_chars: config.max_input_chars.max(1),
            concurrency: config.concurrency.max(1),
        }
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding(0, anyhow!("service returned no vector")))
    }

    /// `result[i]` is the embedding of `texts[i]`. Each text is cut to
    /// `max_input_chars` before submission.
    #[instrument(skip_all, fields(texts = texts.len()))]
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batches: Vec<Vec<String>> = texts
            .chunks(self.batch_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|t| truncate_chars(t, self.max_input_chars).to_string())
                    .collect()
            })
            .collect();

        let this = self;
        // `buffered` yields in submission order regardless of completion order.
        let per_batch: Vec<Vec<Vec<f32>>> = stream::iter(batches.into_iter().enumerate())
            .map(move |(batch, inputs)| async move { this.embed_batch(batch, inputs).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(per_batch.into_iter().flatten().collect())
    }

    async fn embed_batch(&self, batch: usize, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        debug!(batch, size = inputs.len(), "embedding sub-batch");
        let vectors = self
            .service
            .embed(&inputs)
            .await
            .map_err(|e| Error::embedding(batch, e))?;
        if vectors.is_empty() {
            return Err(Error::embedding(
                batch,
                anyhow!("service returned no vectors for {} inputs", inputs.len()),
            ));
        }
        if vectors.len() != inputs.len() {
            return Err(Error::embedding(
                batch,
                anyhow!("service returned {} vectors for {} inputs", vectors.len(), inputs.len()),
            ));
        }
        Ok(vectors)
    }
}
