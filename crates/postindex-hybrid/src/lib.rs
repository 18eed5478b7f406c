//! postindex-hybrid
//!
//! Caller-facing retrieval API. [`RetrievalOrchestrator`] chunks, embeds and
//! stores documents, removes them, and answers semantic, similar-document and
//! hybrid (keyword + semantic, fused) searches.

pub mod orchestrator;
pub mod search;

pub use orchestrator::{IndexReport, RetrievalOrchestrator};
pub use search::{SearchHit, SearchOptions};
