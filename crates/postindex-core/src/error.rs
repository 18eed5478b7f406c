use thiserror::Error;

/// Remote vector-store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Upsert,
    Query,
    Get,
    Delete,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreOp::Upsert => "upsert",
            StoreOp::Query => "query",
            StoreOp::Get => "get",
            StoreOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid vector dimension for '{id}': expected {expected}, got {actual}")]
    InvalidDimension { id: String, expected: usize, actual: usize },

    #[error("Embedding service failed on batch {batch}: {source}")]
    EmbeddingService {
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Vector store {op} failed on batch {batch}: {source}")]
    VectorStore {
        op: StoreOp,
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot derive vector id: {0}")]
    IdentityDerivation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Keyword search failed: {0}")]
    KeywordSearch(#[source] anyhow::Error),

    #[error("Document store failed: {0}")]
    DocumentStore(#[source] anyhow::Error),
}

impl Error {
    pub fn embedding(batch: usize, source: anyhow::Error) -> Self {
        Self::EmbeddingService { batch, source }
    }

    pub fn store(op: StoreOp, batch: usize, source: anyhow::Error) -> Self {
        Self::VectorStore { op, batch, source }
    }

    /// Upstream failures may succeed on a later attempt; validation failures never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingService { .. }
                | Error::VectorStore { .. }
                | Error::KeywordSearch(_)
                | Error::DocumentStore(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_carry_operation_and_batch() {
        let err = Error::store(StoreOp::Upsert, 2, anyhow::anyhow!("503"));
        assert_eq!(err.to_string(), "Vector store upsert failed on batch 2: 503");
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = Error::InvalidDimension { id: "x".into(), expected: 4, actual: 3 };
        assert!(!err.is_retryable());
        assert!(!Error::IdentityDerivation("empty".into()).is_retryable());
    }
}
