//! postindex-core
//!
//! Shared types, configuration, error taxonomy and the pure pieces of the
//! retrieval engine: vector identity, chunking and rank fusion.

pub mod chunker;
pub mod config;
pub mod error;
pub mod fusion;
pub mod identity;
pub mod traits;
pub mod types;

pub use error::{Error, Result, StoreOp};
