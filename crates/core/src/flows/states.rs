use serde::{Deserialize, Serialize};

/// Stage of the in-progress order draft. Advances only forward through the
/// fixed sequence; an explicit restart returns to `SelectEvent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStage {
    SelectEvent,
    SelectTicketType,
    ProvideInfo,
    ConfirmOrder,
    Submitted,
    Abandoned,
}

impl OrderStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted | Self::Abandoned)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftEvent {
    EventResolved,
    TicketTypeChosen,
    ContactCollected,
    OrderConfirmed,
    RestartRequested,
    ConversationAbandoned,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DraftContext {
    pub missing_required_fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftAction {
    PromptEventChoice,
    PromptTicketTypes,
    PromptContactInfo,
    PromptConfirmation,
    SubmitOrder,
    ClearDraft,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OrderStage,
    pub to: OrderStage,
    pub event: DraftEvent,
    pub actions: Vec<DraftAction>,
}
