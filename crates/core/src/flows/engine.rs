use thiserror::Error;

use crate::flows::states::{
    DraftAction, DraftContext, DraftEvent, OrderStage, TransitionOutcome,
};

pub trait DraftFlow {
    fn initial_stage(&self) -> OrderStage;
    fn transition(
        &self,
        current: &OrderStage,
        event: &DraftEvent,
        context: &DraftContext,
    ) -> Result<TransitionOutcome, DraftTransitionError>;
}

/// The single booking flow: event, ticket type, contact info, confirmation.
#[derive(Clone, Debug, Default)]
pub struct BookingFlow;

impl DraftFlow for BookingFlow {
    fn initial_stage(&self) -> OrderStage {
        OrderStage::SelectEvent
    }

    fn transition(
        &self,
        current: &OrderStage,
        event: &DraftEvent,
        context: &DraftContext,
    ) -> Result<TransitionOutcome, DraftTransitionError> {
        transition_booking(current, event, context)
    }
}

pub struct DraftEngine<F> {
    flow: F,
}

impl<F> DraftEngine<F>
where
    F: DraftFlow,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_stage(&self) -> OrderStage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        current: &OrderStage,
        event: &DraftEvent,
        context: &DraftContext,
    ) -> Result<TransitionOutcome, DraftTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for DraftEngine<BookingFlow> {
    fn default() -> Self {
        Self::new(BookingFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftTransitionError {
    #[error("missing required fields before transition from {stage:?}: {missing_fields:?}")]
    MissingRequiredFields { stage: OrderStage, missing_fields: Vec<String> },
    #[error("invalid transition from {stage:?} using event {event:?}")]
    InvalidTransition { stage: OrderStage, event: DraftEvent },
}

fn transition_booking(
    current: &OrderStage,
    event: &DraftEvent,
    context: &DraftContext,
) -> Result<TransitionOutcome, DraftTransitionError> {
    use DraftAction::{
        ClearDraft, PromptConfirmation, PromptContactInfo, PromptEventChoice, PromptTicketTypes,
        SubmitOrder,
    };
    use DraftEvent::{
        ContactCollected, ConversationAbandoned, EventResolved, OrderConfirmed, RestartRequested,
        TicketTypeChosen,
    };
    use OrderStage::{Abandoned, ConfirmOrder, ProvideInfo, SelectEvent, SelectTicketType, Submitted};

    let (to, actions) = match (current, event) {
        // Restart discards everything, from any stage.
        (_, RestartRequested) => (SelectEvent, vec![PromptEventChoice]),
        (_, ConversationAbandoned) => (Abandoned, vec![ClearDraft]),
        (SelectEvent, EventResolved) => (SelectTicketType, vec![PromptTicketTypes]),
        (SelectTicketType, TicketTypeChosen) => (ProvideInfo, vec![PromptContactInfo]),
        (ProvideInfo, ContactCollected) => {
            if !context.missing_required_fields.is_empty() {
                return Err(DraftTransitionError::MissingRequiredFields {
                    stage: *current,
                    missing_fields: context.missing_required_fields.clone(),
                });
            }
            (ConfirmOrder, vec![PromptConfirmation])
        }
        (ConfirmOrder, OrderConfirmed) => (Submitted, vec![SubmitOrder, ClearDraft]),
        _ => {
            return Err(DraftTransitionError::InvalidTransition {
                stage: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{BookingFlow, DraftEngine, DraftTransitionError};
    use crate::flows::states::{DraftAction, DraftContext, DraftEvent, OrderStage};

    #[test]
    fn booking_happy_path_advances_through_all_stages() {
        let engine = DraftEngine::new(BookingFlow);
        let context = DraftContext::default();
        let mut stage = engine.initial_stage();
        assert_eq!(stage, OrderStage::SelectEvent);

        stage = engine
            .apply(&stage, &DraftEvent::EventResolved, &context)
            .expect("select event -> select ticket type")
            .to;
        assert_eq!(stage, OrderStage::SelectTicketType);

        stage = engine
            .apply(&stage, &DraftEvent::TicketTypeChosen, &context)
            .expect("select ticket type -> provide info")
            .to;
        assert_eq!(stage, OrderStage::ProvideInfo);

        stage = engine
            .apply(&stage, &DraftEvent::ContactCollected, &context)
            .expect("provide info -> confirm")
            .to;
        assert_eq!(stage, OrderStage::ConfirmOrder);

        let submitted = engine
            .apply(&stage, &DraftEvent::OrderConfirmed, &context)
            .expect("confirm -> submitted");
        assert_eq!(submitted.to, OrderStage::Submitted);
        assert!(submitted.actions.contains(&DraftAction::SubmitOrder));
        assert!(submitted.actions.contains(&DraftAction::ClearDraft));
    }

    #[test]
    fn stage_never_regresses_without_restart() {
        let engine = DraftEngine::default();
        let context = DraftContext::default();

        let error = engine
            .apply(&OrderStage::ConfirmOrder, &DraftEvent::EventResolved, &context)
            .expect_err("confirm cannot move back to ticket selection");
        assert!(matches!(error, DraftTransitionError::InvalidTransition { .. }));

        let error = engine
            .apply(&OrderStage::ProvideInfo, &DraftEvent::TicketTypeChosen, &context)
            .expect_err("provide info cannot re-run ticket selection");
        assert!(matches!(error, DraftTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn restart_returns_to_select_event_from_any_stage() {
        let engine = DraftEngine::default();
        let context = DraftContext::default();

        for stage in [
            OrderStage::SelectEvent,
            OrderStage::SelectTicketType,
            OrderStage::ProvideInfo,
            OrderStage::ConfirmOrder,
        ] {
            let outcome = engine
                .apply(&stage, &DraftEvent::RestartRequested, &context)
                .expect("restart is always accepted");
            assert_eq!(outcome.to, OrderStage::SelectEvent);
            assert_eq!(outcome.actions, vec![DraftAction::PromptEventChoice]);
        }
    }

    #[test]
    fn abandoning_clears_the_draft_from_any_stage() {
        let engine = DraftEngine::default();
        let context = DraftContext::default();

        for stage in [
            OrderStage::SelectEvent,
            OrderStage::SelectTicketType,
            OrderStage::ProvideInfo,
            OrderStage::ConfirmOrder,
        ] {
            let outcome = engine
                .apply(&stage, &DraftEvent::ConversationAbandoned, &context)
                .expect("abandon is always accepted");
            assert_eq!(outcome.to, OrderStage::Abandoned);
            assert_eq!(outcome.actions, vec![DraftAction::ClearDraft]);
        }
    }

    #[test]
    fn contact_collection_rejects_missing_required_fields() {
        let engine = DraftEngine::default();
        let error = engine
            .apply(
                &OrderStage::ProvideInfo,
                &DraftEvent::ContactCollected,
                &DraftContext {
                    missing_required_fields: vec!["participant_email".to_owned()],
                },
            )
            .expect_err("must reject incomplete contact info");

        assert!(matches!(
            error,
            DraftTransitionError::MissingRequiredFields { stage: OrderStage::ProvideInfo, .. }
        ));
    }

    #[test]
    fn skipping_stages_is_rejected() {
        let engine = DraftEngine::default();
        let error = engine
            .apply(&OrderStage::SelectEvent, &DraftEvent::OrderConfirmed, &DraftContext::default())
            .expect_err("cannot confirm before anything was collected");
        assert!(matches!(
            error,
            DraftTransitionError::InvalidTransition {
                stage: OrderStage::SelectEvent,
                event: DraftEvent::OrderConfirmed
            }
        ));
    }
}
