use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketTypeId(pub String);

/// A scheduled event as the booking assistant sees it.
///
/// Subtype-specific fields ride along in `details` as a closed tagged union;
/// the agent and the synchronizer only ever read the common fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub details: EventDetails,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetails {
    General,
    Music { genre: Option<String>, performers: Vec<String> },
    Workshop { instructor: Option<String>, capacity: Option<u32> },
    Competition { prize_pool: Option<String> },
    Festival { theme: Option<String> },
}

impl EventDetails {
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::General => "event",
            Self::Music { .. } => "music show",
            Self::Workshop { .. } => "workshop",
            Self::Competition { .. } => "competition",
            Self::Festival { .. } => "festival",
        }
    }
}

impl Event {
    /// Canonical text embedded into the vector index for this event.
    pub fn search_text(&self) -> String {
        format!("{} ({})", self.title, self.details.kind_label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: TicketTypeId,
    pub event_id: EventId,
    pub name: String,
    pub price: Decimal,
    pub quantity_available: u32,
}
