use sqlx::Row;
use uuid::Uuid;

use ticketry_core::collaborators::{NewOrder, OrderError, OrderGateway, OrderRef};

use crate::DbPool;

/// Order-creation collaborator. Decrements ticket inventory and inserts the
/// order in one transaction; exhausted inventory is a business error, never
/// an oversold row.
pub struct SqlOrderGateway {
    pool: DbPool,
}

impl SqlOrderGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderGateway for SqlOrderGateway {
    async fn create_order(&self, order: NewOrder) -> Result<OrderRef, OrderError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| OrderError::Store(error.to_string()))?;

        let ticket = sqlx::query(
            "SELECT quantity_available FROM ticket_type WHERE id = ? AND event_id = ?",
        )
        .bind(&order.ticket_type_id.0)
        .bind(&order.event_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| OrderError::Store(error.to_string()))?;

        let Some(ticket) = ticket else {
            return Err(OrderError::UnknownTicketType(order.ticket_type_id.0.clone()));
        };
        let available: i64 = ticket
            .try_get("quantity_available")
            .map_err(|error| OrderError::Store(error.to_string()))?;
        if available <= 0 {
            return Err(OrderError::InsufficientInventory(order.ticket_type_id.0.clone()));
        }

        let decremented = sqlx::query(
            "UPDATE ticket_type SET quantity_available = quantity_available - 1
             WHERE id = ? AND quantity_available > 0",
        )
        .bind(&order.ticket_type_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|error| OrderError::Store(error.to_string()))?;
        if decremented.rows_affected() == 0 {
            // Lost the race against a concurrent order for the last ticket.
            return Err(OrderError::InsufficientInventory(order.ticket_type_id.0.clone()));
        }

        let order_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO ticket_order
                 (id, event_id, ticket_type_id, participant_name, participant_email,
                  participant_phone, participant_organization, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order_id)
        .bind(&order.event_id.0)
        .bind(&order.ticket_type_id.0)
        .bind(&order.participant_name)
        .bind(&order.participant_email)
        .bind(&order.participant_phone)
        .bind(&order.participant_organization)
        .bind(&order.notes)
        .execute(&mut *tx)
        .await
        .map_err(|error| OrderError::Store(error.to_string()))?;

        tx.commit().await.map_err(|error| OrderError::Store(error.to_string()))?;

        Ok(OrderRef { order_id })
    }
}
