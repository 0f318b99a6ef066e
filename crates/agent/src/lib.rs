//! Conversational layer of ticketry: intent classification, the session
//! registry, the per-session booking agent, and the turn-processing service.

pub mod booking;
pub mod classifier;
pub mod registry;
pub mod replies;
pub mod service;

pub use booking::{AgentContext, BookingAgent, ContactExtractor, ContactInfo};
pub use classifier::{ClassifierError, Intent, IntentClassifier, INTENT_SEED_KIND};
pub use registry::{AgentFactory, RegistryError, SessionHandle, SessionRegistry};
pub use service::AssistantService;
