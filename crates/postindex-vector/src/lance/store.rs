use anyhow::{anyhow, bail, Result};
use arrow_array::{
	Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
	TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use postindex_core::traits::VectorStoreService;
use postindex_core::types::{EmbeddingMetadata, MetadataFilter, QueryOptions, VectorEntry, VectorId, VectorMatch};

use super::schema::{build_vectors_schema, filter_column};
use super::table::{ensure_table, ids_predicate, open_db, quote};

pub struct LanceVectorStore {
	db: Connection,
	table_name: String,
	dim: i32,
}

impl LanceVectorStore {
	pub async fn open(db_uri: &str, table_name: &str, dimension: usize) -> Result<Self> {
		let dim = i32::try_from(dimension).map_err(|_| anyhow!("dimension {} too large", dimension))?;
		let db = open_db(db_uri).await?;
		ensure_table(&db, table_name, build_vectors_schema(dim)).await?;
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	async fn table(&self) -> Result<lancedb::Table> {
		Ok(self.db.open_table(&self.table_name).execute().await?)
	}

	fn entries_to_record_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
		let now = Utc::now().timestamp_millis();
		let mut ids = Vec::new(); let mut uris = Vec::new(); let mut authors = Vec::new(); let mut titles = Vec::new();
		let mut chunk_indices = Vec::new(); let mut chunk_counts = Vec::new(); let mut indexed_at = Vec::new();
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for e in entries {
			ids.push(e.id.clone());
			uris.push(e.metadata.uri.clone());
			authors.push(e.metadata.author_did.clone());
			titles.push(e.metadata.title.clone());
			chunk_indices.push(e.metadata.chunk_index.and_then(|i| i32::try_from(i).ok()));
			chunk_counts.push(e.metadata.chunk_count.and_then(|n| i32::try_from(n).ok()));
			indexed_at.push(now);
			vectors.push(Some(e.values.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(build_vectors_schema(self.dim), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(uris)),
			Arc::new(StringArray::from(authors)),
			Arc::new(StringArray::from(titles)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(Int32Array::from(chunk_counts)),
			Arc::new(TimestampMillisecondArray::from(indexed_at)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim)),
		])?;
		Ok(record_batch)
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("{} column missing", name))
}

fn int_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("{} column missing", name))
}

fn opt_index(col: &Int32Array, row: usize) -> Option<usize> {
	if col.is_null(row) { None } else { usize::try_from(col.value(row)).ok() }
}

fn metadata_at(batch: &RecordBatch, row: usize) -> Result<EmbeddingMetadata> {
	let titles = string_col(batch, "title")?;
	Ok(EmbeddingMetadata {
		uri: string_col(batch, "uri")?.value(row).to_string(),
		author_did: string_col(batch, "author_did")?.value(row).to_string(),
		title: if titles.is_null(row) { None } else { Some(titles.value(row).to_string()) },
		chunk_index: opt_index(int_col(batch, "chunk_index")?, row),
		chunk_count: opt_index(int_col(batch, "chunk_count")?, row),
	})
}

fn entries_from_batch(batch: &RecordBatch) -> Result<Vec<VectorEntry>> {
	let ids = string_col(batch, "id")?;
	let vectors = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("vector column missing"))?;
	let mut out = Vec::with_capacity(batch.num_rows());
	for row in 0..batch.num_rows() {
		let list = vectors.value(row);
		let values = list.as_any().downcast_ref::<Float32Array>().ok_or_else(|| anyhow!("vector items are not f32"))?;
		out.push(VectorEntry { id: ids.value(row).to_string(), values: values.values().to_vec(), metadata: metadata_at(batch, row)? });
	}
	Ok(out)
}

/// Equality predicate over promoted metadata columns.
pub fn filter_predicate(filter: &MetadataFilter) -> Result<Option<String>> {
	if filter.is_empty() { return Ok(None); }
	let mut clauses = Vec::with_capacity(filter.len());
	for (key, value) in filter {
		let Some(column) = filter_column(key) else { bail!("metadata key '{}' is not filterable", key) };
		if column.starts_with("chunk_") {
			let n: i64 = value.parse().map_err(|_| anyhow!("'{}' filter needs an integer, got '{}'", key, value))?;
			clauses.push(format!("{} = {}", column, n));
		} else {
			clauses.push(format!("{} = {}", column, quote(value)));
		}
	}
	Ok(Some(clauses.join(" AND ")))
}

#[async_trait]
impl VectorStoreService for LanceVectorStore {
	async fn upsert(&self, entries: &[VectorEntry]) -> anyhow::Result<()> {
		if entries.is_empty() { return Ok(()); }
		let rb = self.entries_to_record_batch(entries)?;
		let schema = rb.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
		let t = self.table().await?;
		// Upsert behavior via merge_insert: id is unique
		let mut mi = t.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		let _ = mi.execute(reader).await?;
		debug!(rows = entries.len(), table = %self.table_name, "merged vectors");
		Ok(())
	}

	async fn query(&self, vector: &[f32], options: &QueryOptions) -> anyhow::Result<Vec<VectorMatch>> {
		let t = self.table().await?;
		let mut q = t.vector_search(vector.to_vec())?.distance_type(DistanceType::Cosine).limit(options.top_k);
		if let Some(predicate) = filter_predicate(&options.filter)? { q = q.only_if(predicate); }
		let mut stream = q.execute().await?;
		let mut matches = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = string_col(&batch, "id")?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
			for row in 0..batch.num_rows() {
				let score = distances.map(|d| 1.0 - d.value(row)).unwrap_or(0.0);
				matches.push(VectorMatch { id: ids.value(row).to_string(), score, metadata: Some(metadata_at(&batch, row)?) });
			}
		}
		matches.sort_by(|a, b| b.score.total_cmp(&a.score));
		Ok(matches)
	}

	async fn get_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<Vec<Option<VectorEntry>>> {
		if ids.is_empty() { return Ok(Vec::new()); }
		let t = self.table().await?;
		let mut stream = t.query().only_if(ids_predicate(ids)).execute().await?;
		let mut by_id: HashMap<String, VectorEntry> = HashMap::new();
		while let Some(batch) = stream.try_next().await? {
			for entry in entries_from_batch(&batch)? { by_id.insert(entry.id.clone(), entry); }
		}
		Ok(ids.iter().map(|id| by_id.get(id).cloned()).collect())
	}

	async fn delete_by_ids(&self, ids: &[VectorId]) -> anyhow::Result<usize> {
		if ids.is_empty() { return Ok(0); }
		let t = self.table().await?;
		let predicate = ids_predicate(ids);
		let present = t.count_rows(Some(predicate.clone())).await?;
		if present > 0 { t.delete(&predicate).await?; }
		Ok(present)
	}
}
