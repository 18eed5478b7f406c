use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use postindex_core::traits::VectorStoreService;
use postindex_core::types::{QueryOptions, VectorEntry, VectorId, VectorMatch};

/// Brute-force cosine store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<BTreeMap<VectorId, VectorEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<VectorId> {
        self.entries.read().await.keys().cloned().collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[async_trait]
impl VectorStoreService for InMemoryVectorStore {
    async fn upsert(&self, entries: &[VectorEntry]) -> anyhow::Result<()> {
        let mut map = self.entries.write().await;
        for entry in entries {
            map.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], options: &QueryOptions) -> anyhow::Result<Vec<VectorMatch>> {
        let map = self.entries.read().await;
        let mut matches: Vec<VectorMatch> = map
            .values()
            .filter(|e| e.metadata.matches(&options.filter))
            .map(|e| VectorMatch {
                id: e.id.clone(),
                score: cosine(vector, &e.values),
                metadata: Some(e.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(options.top_k);
        Ok(matches)
    }

    async fn get_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<Vec<Option<VectorEntry>>> {
        let map = self.entries.read().await;
        Ok(ids.iter().map(|id| map.get(id).cloned()).collect())
    }

    async fn delete_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<usize> {
        let mut map = self.entries.write().await;
        Ok(ids.iter().filter(|id| map.remove(id.as_str()).is_some()).count())
    }
}
