//! Semantic retrieval for ticketry: embedding generation, the vector-index
//! seam with Qdrant and in-memory implementations, and the synchronizer
//! that mirrors relational events into the index.

pub mod embedding;
pub mod memory;
pub mod qdrant;
pub mod retry;
pub mod sync;
pub mod vector;

pub use embedding::{EmbeddingError, EmbeddingProvider, HttpEmbeddingProvider};
pub use memory::InMemoryVectorIndex;
pub use qdrant::QdrantIndex;
pub use sync::{EventVectorSynchronizer, SyncError, SyncReport, EVENT_KIND};
pub use vector::{SearchFilter, SearchHit, VectorIndex, VectorIndexError, VectorRecord};
