use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const DEFAULT_TABLE: &str = "post_vectors";

pub fn build_vectors_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("uri", DataType::Utf8, false),
		Field::new("author_did", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, true),
		Field::new("chunk_index", DataType::Int32, true),
		Field::new("chunk_count", DataType::Int32, true),
		Field::new("indexed_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Column backing a filterable metadata key.
pub fn filter_column(key: &str) -> Option<&'static str> {
	match key {
		"uri" => Some("uri"),
		"authorDid" => Some("author_did"),
		"title" => Some("title"),
		"chunkIndex" => Some("chunk_index"),
		"chunkCount" => Some("chunk_count"),
		_ => None,
	}
}
