//! The vector-index seam. The booking agent and the synchronizer talk to
//! this trait; production wires in Qdrant, tests wire in the in-memory
//! implementation.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VectorIndexError {
    #[error("vector index unreachable: {0}")]
    Connection(String),
    #[error("vector index rejected the request (status {status}): {detail}")]
    Permanent { status: u16, detail: String },
    #[error("could not decode vector index response: {0}")]
    Decode(String),
}

impl VectorIndexError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// One indexed entity. `kind` partitions the collection (event records and
/// intent seed records share it); `id` is the caller's identifier, carried
/// in the payload so search hits map back to relational rows.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorRecord {
    pub kind: String,
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchFilter {
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the backing collection when absent. Idempotent.
    async fn ensure_collection(&self, dimension: usize) -> Result<(), VectorIndexError>;

    /// Declares a keyword payload index used by filtered searches. Idempotent.
    async fn create_payload_index(&self, field: &str) -> Result<(), VectorIndexError>;

    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorIndexError>;

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorIndexError>;

    /// Removes one record. Deleting an id that was never indexed is a no-op.
    async fn delete(&self, kind: &str, id: &str) -> Result<(), VectorIndexError>;
}

/// Stable point identifier for a (kind, id) pair. Backends that require
/// UUID point ids get one derived deterministically, so re-indexing the
/// same entity overwrites rather than duplicates.
pub fn point_id(kind: &str, id: &str) -> Uuid {
    let name = format!("{kind}:{id}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
