//! postindex-embed
//!
//! Batching client in front of a remote embedding service, plus a
//! deterministic hashing embedder for development and tests.

pub mod client;
pub mod hashing;

pub use client::EmbeddingClient;
pub use hashing::HashingEmbedder;
