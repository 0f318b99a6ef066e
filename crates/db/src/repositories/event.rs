use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::sync::broadcast;

use ticketry_core::collaborators::{EventChange, EventStore, StoreError};
use ticketry_core::domain::event::{Event, EventDetails, EventId, TicketType, TicketTypeId};

use super::RepositoryError;
use crate::DbPool;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Relational event store. Every committed mutation publishes an
/// [`EventChange`] on a broadcast channel; subscribers (the vector
/// synchronizer) consume it off the write path, so a slow or absent
/// subscriber never affects the relational transaction.
pub struct SqlEventRepository {
    pool: DbPool,
    changes: broadcast::Sender<EventChange>,
}

impl SqlEventRepository {
    pub fn new(pool: DbPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { pool, changes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventChange> {
        self.changes.subscribe()
    }

    fn publish(&self, change: EventChange) {
        // No receivers is fine; sync is best-effort.
        let _ = self.changes.send(change);
    }

    pub async fn create(&self, event: &Event) -> Result<(), RepositoryError> {
        let details = serde_json::to_string(&event.details)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        sqlx::query(
            "INSERT INTO event (id, title, starts_at, ends_at, details_json)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&event.id.0)
        .bind(&event.title)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(details)
        .execute(&self.pool)
        .await?;

        self.publish(EventChange::Created(event.clone()));
        Ok(())
    }

    pub async fn update(&self, event: &Event) -> Result<(), RepositoryError> {
        let details = serde_json::to_string(&event.details)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let result = sqlx::query(
            "UPDATE event
             SET title = ?, starts_at = ?, ends_at = ?, details_json = ?,
                 updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&event.title)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(details)
        .bind(&event.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.publish(EventChange::Updated(event.clone()));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &EventId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM event WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.publish(EventChange::Deleted(id.clone()));
        }
        Ok(())
    }

    pub async fn add_ticket_type(&self, ticket_type: &TicketType) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO ticket_type (id, event_id, name, price, quantity_available)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&ticket_type.id.0)
        .bind(&ticket_type.event_id.0)
        .bind(&ticket_type.name)
        .bind(ticket_type.price.to_string())
        .bind(i64::from(ticket_type.quantity_available))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &EventId) -> Result<Option<Event>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, starts_at, ends_at, details_json FROM event WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(event_from_row).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, starts_at, ends_at, details_json FROM event ORDER BY starts_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }

    pub async fn list_ticket_types(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<TicketType>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, event_id, name, price, quantity_available
             FROM ticket_type WHERE event_id = ? ORDER BY CAST(price AS REAL) ASC",
        )
        .bind(&event_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ticket_type_from_row).collect()
    }
}

#[async_trait::async_trait]
impl EventStore for SqlEventRepository {
    async fn get_by_id(&self, id: &EventId) -> Result<Option<Event>, StoreError> {
        self.find_by_id(id).await.map_err(|error| StoreError(error.to_string()))
    }

    async fn get_all(&self) -> Result<Vec<Event>, StoreError> {
        self.list_all().await.map_err(|error| StoreError(error.to_string()))
    }

    async fn ticket_types(&self, event_id: &EventId) -> Result<Vec<TicketType>, StoreError> {
        self.list_ticket_types(event_id).await.map_err(|error| StoreError(error.to_string()))
    }
}

fn event_from_row(row: SqliteRow) -> Result<Event, RepositoryError> {
    let details_json: String = row.try_get("details_json")?;
    let details: EventDetails = serde_json::from_str(&details_json)
        .map_err(|error| RepositoryError::Decode(format!("event details: {error}")))?;
    let starts_at: DateTime<Utc> = row.try_get("starts_at")?;
    let ends_at: DateTime<Utc> = row.try_get("ends_at")?;

    Ok(Event {
        id: EventId(row.try_get("id")?),
        title: row.try_get("title")?,
        starts_at,
        ends_at,
        details,
    })
}

fn ticket_type_from_row(row: SqliteRow) -> Result<TicketType, RepositoryError> {
    let price_raw: String = row.try_get("price")?;
    let price: Decimal = price_raw
        .parse()
        .map_err(|_| RepositoryError::Decode(format!("ticket price `{price_raw}`")))?;
    let quantity: i64 = row.try_get("quantity_available")?;

    Ok(TicketType {
        id: TicketTypeId(row.try_get("id")?),
        event_id: EventId(row.try_get("event_id")?),
        name: row.try_get("name")?,
        price,
        quantity_available: quantity.max(0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use ticketry_core::collaborators::{EventChange, EventStore};
    use ticketry_core::domain::event::{Event, EventDetails, EventId, TicketType, TicketTypeId};

    use crate::{connect_with_settings, migrations};

    use super::SqlEventRepository;

    async fn repository() -> SqlEventRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlEventRepository::new(pool)
    }

    fn gala_show() -> Event {
        let starts_at = Utc.with_ymd_and_hms(2026, 9, 12, 19, 0, 0).unwrap();
        Event {
            id: EventId("ev-gala".into()),
            title: "Gala Show".into(),
            starts_at,
            ends_at: starts_at + Duration::hours(3),
            details: EventDetails::Music { genre: Some("pop".into()), performers: vec![] },
        }
    }

    #[tokio::test]
    async fn create_round_trips_and_publishes_a_change() {
        let repo = repository().await;
        let mut changes = repo.subscribe();

        repo.create(&gala_show()).await.expect("create");

        let loaded = repo
            .get_by_id(&EventId("ev-gala".into()))
            .await
            .expect("query")
            .expect("event exists");
        assert_eq!(loaded.title, "Gala Show");
        assert!(matches!(loaded.details, EventDetails::Music { .. }));

        match changes.try_recv().expect("one change published") {
            EventChange::Created(event) => assert_eq!(event.id.0, "ev-gala"),
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_and_delete_publish_their_changes() {
        let repo = repository().await;
        repo.create(&gala_show()).await.expect("create");
        let mut changes = repo.subscribe();

        let mut updated = gala_show();
        updated.title = "Gala Show (Encore)".into();
        repo.update(&updated).await.expect("update");
        repo.delete(&updated.id).await.expect("delete");

        assert!(matches!(changes.try_recv(), Ok(EventChange::Updated(_))));
        assert!(matches!(changes.try_recv(), Ok(EventChange::Deleted(_))));
        assert!(repo.get_by_id(&updated.id).await.expect("query").is_none());
    }

    #[tokio::test]
    async fn deleting_an_unknown_event_publishes_nothing() {
        let repo = repository().await;
        let mut changes = repo.subscribe();

        repo.delete(&EventId("missing".into())).await.expect("delete is a no-op");
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn ticket_types_are_listed_per_event_by_price() {
        let repo = repository().await;
        repo.create(&gala_show()).await.expect("create");

        for (id, name, price, quantity) in
            [("tt-vip", "VIP", "150.00", 10u32), ("tt-std", "Standard", "50.00", 100)]
        {
            repo.add_ticket_type(&TicketType {
                id: TicketTypeId(id.into()),
                event_id: EventId("ev-gala".into()),
                name: name.into(),
                price: price.parse::<Decimal>().unwrap(),
                quantity_available: quantity,
            })
            .await
            .expect("insert ticket type");
        }

        let types = repo.ticket_types(&EventId("ev-gala".into())).await.expect("list");
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].name, "Standard");
        assert_eq!(types[1].name, "VIP");
        assert_eq!(types[1].price, Decimal::new(15_000, 2));
    }
}
