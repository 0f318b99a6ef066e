//! The single turn-processing entry point. Both gates run before any state
//! mutation or network call; either rejection short-circuits with a typed
//! error the interface layer maps to a user-safe response.

use std::sync::Arc;

use tracing::{info, warn};

use ticketry_core::{
    detect_language, ApplicationError, InputType, InputValidator, Language, LimitKind,
    RateLimiter, SessionId,
};

use crate::registry::{RegistryError, SessionRegistry};
use crate::replies;

pub struct AssistantService {
    registry: Arc<SessionRegistry>,
    validator: Arc<InputValidator>,
    limiter: Arc<RateLimiter>,
}

impl AssistantService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        validator: Arc<InputValidator>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self { registry, validator, limiter }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Rate-limit gate for non-reply operations (session creation).
    pub fn check_quota(&self, subject: &str, kind: LimitKind) -> Result<(), ApplicationError> {
        if self.limiter.is_allowed(subject, kind) {
            Ok(())
        } else {
            Err(ApplicationError::RateLimited { subject: subject.to_string() })
        }
    }

    /// Processes one conversational turn. The session's agent is locked for
    /// the duration, so a second concurrent message for the same session
    /// queues instead of interleaving draft mutation.
    pub async fn reply(
        &self,
        user_id: &str,
        session_id: &SessionId,
        message: &str,
    ) -> Result<String, ApplicationError> {
        if !self.limiter.is_allowed(user_id, LimitKind::Message) {
            return Err(ApplicationError::RateLimited { subject: user_id.to_string() });
        }

        let checked = self.validator.validate_input(message, InputType::General);
        if !checked.valid {
            let reason = checked.reason.unwrap_or_else(|| "rejected input".to_string());
            warn!(
                event_name = "input_rejected",
                session_id = %session_id.0,
                reason = %reason,
                "security gate rejected the message"
            );
            return Err(ApplicationError::Validation { reason });
        }

        let handle = self.registry.get_or_create(session_id).map_err(|err| match err {
            RegistryError::SessionNotFound(id) => ApplicationError::NotFound(id),
            RegistryError::IllegalState(message) => ApplicationError::IllegalState(message),
        })?;

        let mut agent = handle.lock().await;
        let reply = agent.handle_turn(message).await;
        let language = agent.language();
        drop(agent);

        info!(
            event_name = "turn_completed",
            session_id = %session_id.0,
            language = language.code(),
            "turn produced a reply"
        );

        // The agent must never emit a blank reply.
        if self.validator.validate_ai_response(&reply).valid {
            Ok(reply)
        } else {
            warn!(event_name = "blank_reply_replaced", session_id = %session_id.0, "blank reply");
            Ok(replies::clarification(detect_language(message)))
        }
    }

    /// Language the assistant would reply in for the given text.
    pub fn language_hint(&self, text: &str) -> Language {
        detect_language(text)
    }

    pub fn session_count(&self) -> usize {
        self.registry.count()
    }
}
