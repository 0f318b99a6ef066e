//! Qdrant over its REST surface. The collection holds both event records
//! and intent seed records, partitioned by the `kind` payload field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::warn;

use ticketry_core::config::VectorConfig;

use crate::retry::backoff_delay;
use crate::vector::{point_id, SearchFilter, SearchHit, VectorIndex, VectorIndexError, VectorRecord};

pub struct QdrantIndex {
    client: reqwest::Client,
    config: VectorConfig,
}

impl QdrantIndex {
    pub fn new(config: VectorConfig) -> Result<Self, VectorIndexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| VectorIndexError::Connection(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }

    /// Issues one request per attempt, retrying transient failures with
    /// capped backoff. 429 and 5xx count as transient; other non-success
    /// statuses are returned to the caller unretried.
    async fn send_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, VectorIndexError> {
        let mut attempt = 1u32;
        loop {
            match self.send_once(method.clone(), url, body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt <= self.config.max_retries => {
                    let delay = backoff_delay(250, 4_000, attempt);
                    warn!(
                        event_name = "vector_index_retry",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        url,
                        error = %err,
                        "retrying vector index request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, VectorIndexError> {
        let mut request = self.client.request(method, url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("api-key", api_key.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                VectorIndexError::Connection("request timed out".to_string())
            } else {
                VectorIndexError::Connection(err.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(VectorIndexError::Connection(format!("server returned {status}")));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Permanent { status: status.as_u16(), detail });
        }

        response
            .json()
            .await
            .map_err(|err| VectorIndexError::Decode(err.to_string()))
    }

    async fn collection_exists(&self) -> Result<bool, VectorIndexError> {
        let url = self.endpoint(&format!("/collections/{}", self.config.collection));
        match self.send_json(Method::GET, &url, None).await {
            Ok(_) => Ok(true),
            Err(VectorIndexError::Permanent { status: 404, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<(), VectorIndexError> {
        if self.collection_exists().await? {
            return Ok(());
        }
        let url = self.endpoint(&format!("/collections/{}", self.config.collection));
        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        self.send_json(Method::PUT, &url, Some(&body)).await?;
        Ok(())
    }

    async fn create_payload_index(&self, field: &str) -> Result<(), VectorIndexError> {
        let url = self.endpoint(&format!("/collections/{}/index", self.config.collection));
        let body = json!({
            "field_name": field,
            "field_schema": "keyword"
        });
        match self.send_json(Method::PUT, &url, Some(&body)).await {
            Ok(_) => Ok(()),
            // Qdrant answers 409 when the index already exists.
            Err(VectorIndexError::Permanent { status: 409, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn upsert(&self, record: VectorRecord) -> Result<(), VectorIndexError> {
        let mut payload = record.payload;
        if let Value::Object(map) = &mut payload {
            map.insert("kind".to_string(), Value::String(record.kind.clone()));
            map.insert("id".to_string(), Value::String(record.id.clone()));
        }
        let url =
            self.endpoint(&format!("/collections/{}/points?wait=true", self.config.collection));
        let body = json!({
            "points": [{
                "id": point_id(&record.kind, &record.id).to_string(),
                "vector": record.vector,
                "payload": payload
            }]
        });
        self.send_json(Method::PUT, &url, Some(&body)).await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        let url =
            self.endpoint(&format!("/collections/{}/points/search", self.config.collection));
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "filter": {
                "must": [{ "key": "kind", "match": { "value": filter.kind } }]
            }
        });
        let response = self.send_json(Method::POST, &url, Some(&body)).await?;

        let points = response
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| VectorIndexError::Decode("search result is not an array".into()))?;

        points
            .iter()
            .map(|point| {
                let payload = point.get("payload").cloned().unwrap_or(Value::Null);
                let id = payload
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        VectorIndexError::Decode("search hit payload is missing `id`".into())
                    })?
                    .to_string();
                let score = point
                    .get("score")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| VectorIndexError::Decode("search hit has no score".into()))?
                    as f32;
                Ok(SearchHit { id, score, payload })
            })
            .collect()
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), VectorIndexError> {
        let url = self
            .endpoint(&format!("/collections/{}/points/delete?wait=true", self.config.collection));
        let body = json!({
            "points": [point_id(kind, id).to_string()]
        });
        // Qdrant treats deleting an unknown point as a successful no-op.
        self.send_json(Method::POST, &url, Some(&body)).await?;
        Ok(())
    }
}
