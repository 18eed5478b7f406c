use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use postindex_core::config::RetrievalConfig;
use postindex_core::identity::{derive_all_ids, derive_id};
use postindex_core::traits::VectorStoreService;
use postindex_core::types::{EmbeddingMetadata, QueryOptions, VectorEntry, VectorId, VectorMatch};
use postindex_core::{Error, StoreOp};
use postindex_vector::{InMemoryVectorStore, VectorStoreAdapter};

const DIM: usize = 4;
const URI: &str = "at://did:plc:author/app.blog.entry/abc";

/// In-memory store that records every call made through it.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryVectorStore,
    upserts: Mutex<Vec<usize>>,
    deletes: Mutex<Vec<Vec<VectorId>>>,
    gets: Mutex<Vec<Vec<VectorId>>>,
    fail_upsert_call: Option<usize>,
}

#[async_trait]
impl VectorStoreService for RecordingStore {
    async fn upsert(&self, entries: &[VectorEntry]) -> anyhow::Result<()> {
        let call = {
            let mut upserts = self.upserts.lock().expect("lock");
            upserts.push(entries.len());
            upserts.len() - 1
        };
        if self.fail_upsert_call == Some(call) {
            return Err(anyhow!("store unavailable"));
        }
        self.inner.upsert(entries).await
    }

    async fn query(&self, vector: &[f32], options: &QueryOptions) -> anyhow::Result<Vec<VectorMatch>> {
        self.inner.query(vector, options).await
    }

    async fn get_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<Vec<Option<VectorEntry>>> {
        self.gets.lock().expect("lock").push(ids.to_vec());
        self.inner.get_by_ids(ids).await
    }

    async fn delete_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<usize> {
        self.deletes.lock().expect("lock").push(ids.to_vec());
        self.inner.delete_by_ids(ids).await
    }
}

fn config() -> RetrievalConfig {
    RetrievalConfig { dimension: DIM, ..RetrievalConfig::default() }
}

fn entry(id: impl Into<String>, uri: &str, seed: f32) -> VectorEntry {
    VectorEntry {
        id: id.into(),
        values: vec![seed, 1.0, 0.0, 0.5],
        metadata: EmbeddingMetadata::new(uri, "did:plc:author"),
    }
}

fn entries(n: usize) -> Vec<VectorEntry> {
    (0..n).map(|i| entry(format!("id{i}"), &format!("at://x/{i}"), i as f32)).collect()
}

fn adapter(store: &Arc<RecordingStore>) -> VectorStoreAdapter {
    VectorStoreAdapter::new(store.clone(), &config())
}

#[tokio::test]
async fn upsert_many_splits_into_store_batches() {
    let store = Arc::new(RecordingStore::default());
    let written = adapter(&store).upsert_many(entries(150)).await.expect("upsert");
    assert_eq!(written, 150);
    assert_eq!(*store.upserts.lock().expect("lock"), vec![100, 50]);
    assert_eq!(store.inner.len().await, 150);
}

#[tokio::test]
async fn one_bad_dimension_rejects_the_whole_call() {
    let store = Arc::new(RecordingStore::default());
    let mut batch = entries(10);
    batch[7].values.push(9.0);
    let err = adapter(&store).upsert_many(batch).await.expect_err("must fail");
    assert!(matches!(err, Error::InvalidDimension { expected: 4, actual: 5, .. }));
    assert!(!err.is_retryable());
    assert!(store.upserts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn oversized_or_empty_id_rejects_the_whole_call() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);

    let mut batch = entries(10);
    batch[4].id = "x".repeat(65);
    let err = adapter.upsert_many(batch).await.expect_err("must fail");
    assert!(matches!(err, Error::IdentityDerivation(_)), "got {err}");
    assert!(!err.is_retryable());

    let mut batch = entries(10);
    batch[9].id = String::new();
    let err = adapter.upsert_many(batch).await.expect_err("must fail");
    assert!(matches!(err, Error::IdentityDerivation(_)), "got {err}");

    assert!(store.upserts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn id_at_the_key_limit_is_accepted() {
    let store = Arc::new(RecordingStore::default());
    let mut batch = entries(1);
    batch[0].id = "x".repeat(64);
    assert_eq!(adapter(&store).upsert_many(batch).await.expect("upsert"), 1);
}

#[tokio::test]
async fn upsert_one_checks_dimension() {
    let store = Arc::new(RecordingStore::default());
    let err = adapter(&store)
        .upsert_one("x".into(), vec![1.0; 3], EmbeddingMetadata::new("u", "a"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, Error::InvalidDimension { .. }));
}

#[tokio::test]
async fn empty_upsert_is_a_no_op() {
    let store = Arc::new(RecordingStore::default());
    assert_eq!(adapter(&store).upsert_many(Vec::new()).await.expect("upsert"), 0);
    assert!(store.upserts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn upsert_is_idempotent_per_id() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);
    adapter.upsert_one("same".into(), vec![1.0; DIM], EmbeddingMetadata::new("u", "a")).await.expect("upsert");
    adapter.upsert_one("same".into(), vec![2.0; DIM], EmbeddingMetadata::new("u", "a")).await.expect("upsert");
    assert_eq!(store.inner.len().await, 1);
    let got = adapter.get_by_ids(&["same".to_string()]).await.expect("get");
    assert_eq!(got[0].values, vec![2.0; DIM]);
}

#[tokio::test]
async fn failing_sub_batch_is_reported_and_earlier_batches_stay() {
    let store = Arc::new(RecordingStore { fail_upsert_call: Some(1), ..Default::default() });
    let err = adapter(&store).upsert_many(entries(250)).await.expect_err("must fail");
    assert!(matches!(err, Error::VectorStore { op: StoreOp::Upsert, batch: 1, .. }), "got {err}");
    assert_eq!(store.inner.len().await, 100);
}

#[tokio::test]
async fn oversized_titles_are_truncated_not_rejected() {
    let store = Arc::new(RecordingStore::default());
    let mut e = entry("t", "u", 1.0);
    e.metadata.title = Some("x".repeat(1000));
    adapter(&store).upsert_many(vec![e]).await.expect("upsert");
    let got = store.inner.get_by_ids(&["t".to_string()]).await.expect("get");
    let title = got[0].as_ref().and_then(|e| e.metadata.title.clone()).expect("title");
    assert_eq!(title.chars().count(), config().store.title_max_chars);
}

#[tokio::test]
async fn delete_post_vectors_covers_base_and_all_chunk_ids() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);
    let base = derive_id(URI, None).expect("id");
    adapter
        .upsert_many(vec![entry(base.clone(), URI, 1.0), entry(format!("{base}:c1"), URI, 2.0)])
        .await
        .expect("upsert");

    let removed = adapter.delete_post_vectors(URI).await.expect("delete");
    assert_eq!(removed, 2);

    let deletes = store.deletes.lock().expect("lock").clone();
    let requested: Vec<VectorId> = deletes.into_iter().flatten().collect();
    assert!(requested.contains(&base));
    for n in 1..config().max_chunks {
        assert!(requested.contains(&format!("{base}:c{n}")));
    }
    assert_eq!(requested, derive_all_ids(URI, config().max_chunks).expect("ids"));
}

#[tokio::test]
async fn deleting_missing_ids_is_not_an_error() {
    let store = Arc::new(RecordingStore::default());
    let removed = adapter(&store).delete_by_ids(&["nope".to_string()]).await.expect("delete");
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn get_post_vectors_falls_back_to_chunk_ids() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);
    let c1 = derive_id(URI, Some(1)).expect("id");
    let c2 = derive_id(URI, Some(2)).expect("id");
    adapter.upsert_many(vec![entry(c1.clone(), URI, 1.0), entry(c2.clone(), URI, 2.0)]).await.expect("upsert");

    let found = adapter.get_post_vectors(URI).await.expect("get");
    let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![c1.as_str(), c2.as_str()]);

    let gets = store.gets.lock().expect("lock").clone();
    assert_eq!(gets[0], vec![derive_id(URI, None).expect("id")]);
    assert_eq!(gets.len(), 2, "base lookup then chunk-range lookup");
}

#[tokio::test]
async fn get_post_vectors_returns_single_base_vector() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);
    let base = derive_id(URI, None).expect("id");
    adapter.upsert_many(vec![entry(base.clone(), URI, 1.0)]).await.expect("upsert");

    let found = adapter.get_post_vectors(URI).await.expect("get");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, base);
    assert_eq!(store.gets.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn get_post_vectors_follows_chunk_count_hint() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);
    let ids = derive_all_ids(URI, 3).expect("ids");
    let batch: Vec<VectorEntry> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let mut e = entry(id.clone(), URI, i as f32);
            e.metadata.chunk_index = Some(i);
            e.metadata.chunk_count = Some(3);
            e
        })
        .collect();
    adapter.upsert_many(batch).await.expect("upsert");

    let found = adapter.get_post_vectors(URI).await.expect("get");
    let got: Vec<String> = found.into_iter().map(|e| e.id).collect();
    assert_eq!(got, ids);
}

#[tokio::test]
async fn query_validates_dimension_and_passes_filter() {
    let store = Arc::new(RecordingStore::default());
    let adapter = adapter(&store);
    let mut other = entry("other", "at://y/1", 1.0);
    other.metadata.author_did = "did:plc:someone-else".into();
    adapter.upsert_many(vec![entry("mine", "at://x/1", 1.0), other]).await.expect("upsert");

    let err = adapter.query(&[1.0, 2.0], &QueryOptions::top_k(5)).await.expect_err("must fail");
    assert!(matches!(err, Error::InvalidDimension { .. }));

    let options = QueryOptions::top_k(5).with_filter("authorDid", "did:plc:author");
    let matches = adapter.query(&[1.0, 1.0, 0.0, 0.5], &options).await.expect("query");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "mine");
}
