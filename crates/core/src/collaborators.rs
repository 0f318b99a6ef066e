//! Narrow seams to the relational collaborators. The booking agent consumes
//! these traits; `ticketry-db` provides the sqlx-backed implementations.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::event::{Event, EventId, TicketType, TicketTypeId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("event store failure: {0}")]
pub struct StoreError(pub String);

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_by_id(&self, id: &EventId) -> Result<Option<Event>, StoreError>;
    async fn get_all(&self) -> Result<Vec<Event>, StoreError>;
    async fn ticket_types(&self, event_id: &EventId) -> Result<Vec<TicketType>, StoreError>;
}

/// Completed-draft payload handed to the order-creation collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub event_id: EventId,
    pub ticket_type_id: TicketTypeId,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_phone: Option<String>,
    pub participant_organization: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRef {
    pub order_id: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("insufficient ticket inventory for ticket type {0}")]
    InsufficientInventory(String),
    #[error("unknown ticket type {0}")]
    UnknownTicketType(String),
    #[error("order store failure: {0}")]
    Store(String),
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_order(&self, order: NewOrder) -> Result<OrderRef, OrderError>;
}

/// Lifecycle notification published by the event store after each committed
/// mutation. The vector synchronizer subscribes to these; a subscriber
/// failure never reaches the relational write path.
#[derive(Clone, Debug, PartialEq)]
pub enum EventChange {
    Created(Event),
    Updated(Event),
    Deleted(EventId),
}
