//! postindex-vector
//!
//! [`VectorStoreAdapter`] enforces dimension, batch and key limits in front
//! of any [`VectorStoreService`](postindex_core::traits::VectorStoreService).
//! Backends: [`InMemoryVectorStore`] and, with the `lance` feature, a
//! LanceDB table.

pub mod adapter;
pub mod memory;

#[cfg(feature = "lance")]
pub mod lance;

pub use adapter::VectorStoreAdapter;
pub use memory::InMemoryVectorStore;
