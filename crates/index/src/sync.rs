//! Keeps the vector index aligned with the relational event table. Initial
//! alignment happens through `sync_all`; afterwards the change listener
//! applies each committed mutation as it is published.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ticketry_core::{Event, EventChange, EventId, EventStore, StoreError};

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::vector::{VectorIndex, VectorIndexError, VectorRecord};

pub const EVENT_KIND: &str = "event";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] VectorIndexError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
}

pub struct EventVectorSynchronizer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl EventVectorSynchronizer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn sync_event(&self, event: &Event) -> Result<(), SyncError> {
        let vector = self.embedder.embed(&event.search_text()).await?;
        let record = VectorRecord {
            kind: EVENT_KIND.to_string(),
            id: event.id.0.clone(),
            vector,
            payload: json!({
                "title": event.title,
                "event_kind": event.details.kind_label(),
                "starts_at_epoch": event.starts_at.timestamp(),
            }),
        };
        self.index.upsert(record).await?;
        Ok(())
    }

    pub async fn remove_event(&self, id: &EventId) -> Result<(), SyncError> {
        self.index.delete(EVENT_KIND, &id.0).await?;
        Ok(())
    }

    /// Re-indexes every stored event. One bad event does not stop the
    /// sweep; failures are logged and counted.
    pub async fn sync_all(&self, store: &dyn EventStore) -> Result<SyncReport, SyncError> {
        let events = store.get_all().await?;
        let mut report = SyncReport::default();

        for event in &events {
            match self.sync_event(event).await {
                Ok(()) => report.synced += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        event_name = "event_sync_failed",
                        event_id = %event.id.0,
                        error = %err,
                        "skipping event during bulk sync"
                    );
                }
            }
        }

        info!(
            event_name = "event_sync_completed",
            synced = report.synced,
            failed = report.failed,
            "bulk event sync finished"
        );
        Ok(report)
    }

    async fn apply_change(&self, change: EventChange) {
        let result = match &change {
            EventChange::Created(event) | EventChange::Updated(event) => {
                self.sync_event(event).await
            }
            EventChange::Deleted(id) => self.remove_event(id).await,
        };
        if let Err(err) = result {
            error!(
                event_name = "event_change_sync_failed",
                error = %err,
                "could not propagate event change to the vector index"
            );
        }
    }

    /// Drives the index from the store's change feed until the publishing
    /// side closes. A lagged receiver falls back to a full re-sync so
    /// dropped notifications cannot leave stale records behind.
    pub fn spawn_change_listener(
        self: Arc<Self>,
        store: Arc<dyn EventStore>,
        mut changes: broadcast::Receiver<EventChange>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => self.apply_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            event_name = "event_change_lagged",
                            skipped,
                            "change feed lagged, running full re-sync"
                        );
                        if let Err(err) = self.sync_all(store.as_ref()).await {
                            error!(
                                event_name = "event_sync_failed",
                                error = %err,
                                "re-sync after lag failed"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
