//! In-memory vector index used by tests and by local runs without a Qdrant
//! instance. Exact cosine scoring over a guarded map.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::vector::{SearchFilter, SearchHit, VectorIndex, VectorIndexError, VectorRecord};

#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: Mutex<HashMap<(String, String), VectorRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure_collection(&self, _dimension: usize) -> Result<(), VectorIndexError> {
        Ok(())
    }

    async fn create_payload_index(&self, _field: &str) -> Result<(), VectorIndexError> {
        Ok(())
    }

    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorIndexError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| VectorIndexError::Connection("index lock poisoned".into()))?;
        records.insert((record.kind.clone(), record.id.clone()), record);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        let records = self
            .records
            .lock()
            .map_err(|_| VectorIndexError::Connection("index lock poisoned".into()))?;

        let mut hits: Vec<SearchHit> = records
            .values()
            .filter(|record| record.kind == filter.kind)
            .map(|record| {
                let mut payload = record.payload.clone();
                if let Value::Object(map) = &mut payload {
                    map.insert("kind".to_string(), Value::String(record.kind.clone()));
                    map.insert("id".to_string(), Value::String(record.id.clone()));
                }
                SearchHit {
                    id: record.id.clone(),
                    score: cosine_similarity(vector, &record.vector),
                    payload,
                }
            })
            .collect();

        // Highest score first; ties break on id for a stable order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), VectorIndexError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| VectorIndexError::Connection("index lock poisoned".into()))?;
        records.remove(&(kind.to_string(), id.to_string()));
        Ok(())
    }
}
