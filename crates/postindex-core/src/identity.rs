//! Vector identity scheme.
//!
//! The base id of a document is the first [`BASE_ID_LEN`] hex characters of
//! the BLAKE3 digest of its URI (128 bits). Chunk `n >= 1` is stored under
//! `<base>:c<n>`. Truncating the digest trades collision resistance for key
//! length: accidental collisions are negligible at expected corpus sizes but
//! not impossible, so this is a size/risk trade-off rather than a guarantee.

use crate::error::{Error, Result};
use crate::types::VectorId;

/// Storage-key byte limit imposed by the vector store.
pub const MAX_VECTOR_ID_BYTES: usize = 64;
/// Length of the base id in bytes (hex chars).
pub const BASE_ID_LEN: usize = 32;
/// Chunk range cleared when the real chunk count is unknown.
pub const DEFAULT_MAX_CHUNKS: usize = 20;

const CHUNK_SEPARATOR: &str = ":c";

pub fn derive_base_id(uri: &str) -> Result<VectorId> {
    if uri.trim().is_empty() {
        return Err(Error::IdentityDerivation("document uri is empty".to_string()));
    }
    let hex = blake3::hash(uri.as_bytes()).to_hex();
    Ok(hex.as_str()[..BASE_ID_LEN].to_string())
}

/// Base id for chunk 0 or `None`, `<base>:c<n>` otherwise.
pub fn derive_id(uri: &str, chunk_index: Option<usize>) -> Result<VectorId> {
    let base = derive_base_id(uri)?;
    match chunk_index {
        None | Some(0) => Ok(base),
        Some(n) => chunk_id(&base, n),
    }
}

/// `[base, base:c1, ..., base:c(chunk_count-1)]`.
pub fn derive_all_ids(uri: &str, chunk_count: usize) -> Result<Vec<VectorId>> {
    let base = derive_base_id(uri)?;
    if chunk_count == 0 {
        return Ok(Vec::new());
    }
    let mut ids = Vec::with_capacity(chunk_count);
    for n in 1..chunk_count {
        ids.push(chunk_id(&base, n)?);
    }
    ids.insert(0, base);
    Ok(ids)
}

/// Splits an id into its base part and chunk index (0 for a base id).
pub fn split_id(id: &str) -> (&str, usize) {
    if let Some((base, suffix)) = id.rsplit_once(CHUNK_SEPARATOR) {
        if let Ok(n) = suffix.parse::<usize>() {
            return (base, n);
        }
    }
    (id, 0)
}

/// True when every id of a `chunk_count`-chunk document fits in [`MAX_VECTOR_ID_BYTES`].
pub fn fits_key_limit(chunk_count: usize) -> bool {
    if chunk_count <= 1 {
        return true;
    }
    let suffix = format!("{CHUNK_SEPARATOR}{}", chunk_count - 1);
    BASE_ID_LEN + suffix.len() <= MAX_VECTOR_ID_BYTES
}

fn chunk_id(base: &str, n: usize) -> Result<VectorId> {
    let id = format!("{base}{CHUNK_SEPARATOR}{n}");
    if id.len() > MAX_VECTOR_ID_BYTES {
        return Err(Error::IdentityDerivation(format!(
            "chunk id '{id}' exceeds {MAX_VECTOR_ID_BYTES} bytes"
        )));
    }
    Ok(id)
}
