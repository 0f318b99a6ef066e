pub mod engine;
pub mod states;

pub use engine::{BookingFlow, DraftEngine, DraftFlow, DraftTransitionError};
pub use states::{DraftAction, DraftContext, DraftEvent, OrderStage, TransitionOutcome};
