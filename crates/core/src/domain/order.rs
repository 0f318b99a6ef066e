use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::NewOrder;
use crate::domain::event::{EventId, TicketTypeId};
use crate::flows::states::OrderStage;
use crate::security::InputValidator;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedEvent {
    pub id: EventId,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedTicketType {
    pub id: TicketTypeId,
    pub name: String,
}

/// Required draft fields, in the order the agent prompts for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingField {
    Event,
    TicketType,
    ParticipantName,
    ParticipantEmail,
}

impl MissingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::TicketType => "ticket_type",
            Self::ParticipantName => "participant_name",
            Self::ParticipantEmail => "participant_email",
        }
    }
}

/// The in-progress ticket order assembled across conversation turns.
///
/// Owned exclusively by one session; the stage only moves forward through
/// the flow engine and a restart wipes every collected field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub event: Option<SelectedEvent>,
    pub ticket_type: Option<SelectedTicketType>,
    pub participant_name: Option<String>,
    pub participant_email: Option<String>,
    pub participant_phone: Option<String>,
    pub participant_organization: Option<String>,
    pub notes: Option<String>,
    pub stage: OrderStage,
    pub created_at: DateTime<Utc>,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self {
            event: None,
            ticket_type: None,
            participant_name: None,
            participant_email: None,
            participant_phone: None,
            participant_organization: None,
            notes: None,
            stage: OrderStage::SelectEvent,
            created_at: Utc::now(),
        }
    }

    /// Ordered list of unmet requirements, computed from current fields.
    pub fn missing_fields(&self, validator: &InputValidator) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.event.is_none() {
            missing.push(MissingField::Event);
        }
        if self.ticket_type.is_none() {
            missing.push(MissingField::TicketType);
        }
        if self.participant_name.as_deref().map_or(true, |name| name.trim().is_empty()) {
            missing.push(MissingField::ParticipantName);
        }
        if self
            .participant_email
            .as_deref()
            .map_or(true, |email| !validator.is_valid_email(email))
        {
            missing.push(MissingField::ParticipantEmail);
        }
        missing
    }

    pub fn is_complete(&self, validator: &InputValidator) -> bool {
        self.missing_fields(validator).is_empty()
    }

    /// Discards all collected fields and returns to `SelectEvent`. The draft
    /// keeps its original creation time.
    pub fn restart(&mut self) {
        let created_at = self.created_at;
        *self = Self::new();
        self.created_at = created_at;
    }

    /// Payload for the order-creation collaborator, once complete.
    pub fn to_new_order(&self, validator: &InputValidator) -> Option<NewOrder> {
        if !self.is_complete(validator) {
            return None;
        }
        let event = self.event.as_ref()?;
        let ticket_type = self.ticket_type.as_ref()?;

        Some(NewOrder {
            event_id: event.id.clone(),
            ticket_type_id: ticket_type.id.clone(),
            participant_name: self.participant_name.clone()?,
            participant_email: self.participant_email.clone()?,
            participant_phone: self.participant_phone.clone(),
            participant_organization: self.participant_organization.clone(),
            notes: self.notes.clone(),
        })
    }
}

impl Default for OrderDraft {
    fn default() -> Self {
        Self::new()
    }
}
