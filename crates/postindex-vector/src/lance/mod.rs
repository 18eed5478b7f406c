//! LanceDB-backed vector store.
//!
//! One table holds every vector with its metadata promoted to columns, so
//! metadata filters compile to SQL predicates.

pub mod schema;
pub mod store;
pub mod table;

pub use schema::DEFAULT_TABLE;
pub use store::{filter_predicate, LanceVectorStore};
