use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ticketry_agent::{
    AgentContext, AssistantService, BookingAgent, IntentClassifier, SessionRegistry,
};
use ticketry_core::config::{AppConfig, ConfigError, LoadOptions};
use ticketry_core::schedule::BusinessHours;
use ticketry_core::{EventStore, InputValidator, RateLimiter};
use ticketry_db::{
    connect, migrations, DbPool, SqlEventRepository, SqlOrderGateway, SqlSessionRepository,
};
use ticketry_index::{
    EmbeddingError, EventVectorSynchronizer, HttpEmbeddingProvider, QdrantIndex, VectorIndex,
    VectorIndexError,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<AssistantService>,
    pub sessions: Arc<SqlSessionRepository>,
    pub sync_task: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("embedding client construction failed: {0}")]
    Embedding(#[source] EmbeddingError),
    #[error("vector index client construction failed: {0}")]
    VectorIndex(#[source] VectorIndexError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "bootstrap_database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "bootstrap_migrations_applied", "database migrations applied");

    let events = Arc::new(SqlEventRepository::new(db_pool.clone()));
    let changes = events.subscribe();

    let embedder = Arc::new(
        HttpEmbeddingProvider::new(config.embedding.clone()).map_err(BootstrapError::Embedding)?,
    );
    let index =
        Arc::new(QdrantIndex::new(config.vector.clone()).map_err(BootstrapError::VectorIndex)?);

    let classifier = Arc::new(IntentClassifier::new(
        embedder.clone(),
        index.clone(),
        config.vector.similarity_threshold,
        config.vector.top_k,
    ));

    // The index is prepared best-effort. A Qdrant outage at startup leaves
    // the assistant degraded (classification fails per turn with a
    // localized apology) instead of blocking boot.
    match prepare_index(index.as_ref(), config.embedding.dimension).await {
        Ok(()) => {
            if let Err(err) = classifier.seed_intent_examples().await {
                warn!(event_name = "intent_seed_failed", error = %err, "intent seeding failed");
            }
        }
        Err(err) => {
            warn!(event_name = "vector_index_unavailable", error = %err, "continuing degraded");
        }
    }

    let synchronizer =
        Arc::new(EventVectorSynchronizer::new(embedder.clone(), index.clone()));
    let event_store: Arc<dyn EventStore> = events.clone();

    match synchronizer.sync_all(event_store.as_ref()).await {
        Ok(report) => {
            info!(
                event_name = "bootstrap_event_sync",
                synced = report.synced,
                failed = report.failed,
                "initial event sync finished"
            );
        }
        Err(err) => {
            warn!(event_name = "bootstrap_event_sync_failed", error = %err, "initial sync failed");
        }
    }
    let sync_task = synchronizer.spawn_change_listener(event_store.clone(), changes);

    let validator = Arc::new(InputValidator::new());
    let orders = Arc::new(SqlOrderGateway::new(db_pool.clone()));
    let business_hours = BusinessHours {
        start_hour: config.schedule.business_start_hour,
        end_hour: config.schedule.business_end_hour,
        slot_minutes: config.schedule.slot_minutes,
    };
    let agent_context = Arc::new(AgentContext::new(
        classifier,
        event_store,
        orders,
        validator.clone(),
        business_hours,
    ));
    let registry = Arc::new(SessionRegistry::with_factory(Arc::new(move || {
        BookingAgent::new(agent_context.clone())
    })));

    let limiter = Arc::new(RateLimiter::new(config.security.rate_limits()));
    let service = Arc::new(AssistantService::new(registry, validator, limiter));
    let sessions = Arc::new(SqlSessionRepository::new(db_pool.clone()));

    info!(event_name = "bootstrap_complete", "application bootstrap complete");
    Ok(Application { config, db_pool, service, sessions, sync_task })
}

async fn prepare_index(index: &QdrantIndex, dimension: usize) -> Result<(), VectorIndexError> {
    index.ensure_collection(dimension).await?;
    index.create_payload_index("kind").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ticketry_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_service_with_in_memory_database() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap succeeds without a reachable vector index");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('event', 'ticket_type', 'ticket_order', 'conversation_session', 'session_message')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query succeeds");
        assert_eq!(table_count, 5);

        assert_eq!(app.service.session_count(), 0);

        app.sync_task.abort();
        app.db_pool.close().await;
    }
}
