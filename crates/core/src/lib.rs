pub mod collaborators;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod language;
pub mod schedule;
pub mod security;

pub use collaborators::{
    EventChange, EventStore, NewOrder, OrderError, OrderGateway, OrderRef, StoreError,
};
pub use domain::event::{Event, EventDetails, EventId, TicketType, TicketTypeId};
pub use domain::order::{MissingField, OrderDraft, SelectedEvent, SelectedTicketType};
pub use domain::session::{ConversationSession, SessionId, TranscriptMessage};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use language::{detect_language, Language};
pub use schedule::{bucket_events, default_slots, free_slots, BusinessHours, RelativeBuckets, TimeSlot};
pub use security::{InputType, InputValidator, LimitKind, RateLimiter, ValidationResult};
