//! The per-session booking agent. One turn runs: detect language, check for
//! an explicit restart, classify, then advance the order draft through the
//! flow engine. Failures never advance the stage and never leak raw errors
//! into the conversation.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use tracing::{error, info, warn};

use ticketry_core::flows::{
    BookingFlow, DraftContext, DraftEngine, DraftEvent, DraftTransitionError, OrderStage,
};
use ticketry_core::schedule::{bucket_events, default_slots, free_slots, BusinessHours};
use ticketry_core::{
    detect_language, EventStore, InputValidator, Language, OrderDraft, OrderError, OrderGateway,
    SelectedEvent, SelectedTicketType, TicketType,
};

use crate::classifier::{Intent, IntentClassifier};
use crate::replies;

const RESTART_MARKERS: &[&str] =
    &["làm lại", "bắt đầu lại", "restart", "start over", "reset"];

const ABANDON_MARKERS: &[&str] = &["hủy", "cancel"];

const CONFIRM_MARKERS: &[&str] = &["xác nhận", "đồng ý", "confirm", "yes", "ok", "okay"];

// "có" reads as agreement only when it is the entire answer; inside a
// longer sentence it is usually the verb "to have".
const BARE_CONFIRM_MARKERS: &[&str] = &["có"];

fn contains_marker(text: &str, markers: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    markers.iter().any(|marker| matches_whole_word(&lowered, marker))
}

/// True when `marker` occurs with no letter or digit butting against either
/// end, so "ok" never fires inside "book".
fn matches_whole_word(lowered: &str, marker: &str) -> bool {
    let mut from = 0;
    while let Some(found) = lowered[from..].find(marker) {
        let begin = from + found;
        let end = begin + marker.len();
        let blocked_before =
            lowered[..begin].chars().next_back().map_or(false, char::is_alphanumeric);
        let blocked_after = lowered[end..].chars().next().map_or(false, char::is_alphanumeric);
        if !blocked_before && !blocked_after {
            return true;
        }
        from = end;
    }
    false
}

fn is_confirmation(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let bare = lowered.trim_matches(|c: char| !c.is_alphanumeric());
    BARE_CONFIRM_MARKERS.iter().any(|marker| bare == *marker)
        || CONFIRM_MARKERS.iter().any(|marker| matches_whole_word(&lowered, marker))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Regex-based extraction of participant details from free text.
#[derive(Clone, Debug)]
pub struct ContactExtractor {
    name: Regex,
    email: Regex,
    phone: Regex,
}

impl ContactExtractor {
    pub fn new() -> Self {
        let name = Regex::new(r"(?i)(?:tên tôi là|tên là|my name is|i am|i'm)\s+([^,;.\n]+)")
            .expect("name pattern is valid");
        let email = Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
            .expect("email pattern is valid");
        let phone = Regex::new(r"\+?\d[\d .\-]{7,}\d").expect("phone pattern is valid");
        Self { name, email, phone }
    }

    pub fn extract(&self, text: &str) -> ContactInfo {
        let email = self.email.find(text).map(|found| found.as_str().to_string());
        let phone = self.phone.find(text).map(|found| found.as_str().to_string());
        let name = self
            .name
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().trim().to_string())
            .or_else(|| bare_name(text));

        ContactInfo { name, email, phone }
    }
}

impl Default for ContactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// A message that is nothing but two to five alphabetic words reads as a
/// bare name ("Nguyen Van An").
fn bare_name(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.contains('@') || trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let words = trimmed.split_whitespace().count();
    if (2..=5).contains(&words) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Collaborators shared by every agent instance the factory produces.
pub struct AgentContext {
    pub classifier: Arc<IntentClassifier>,
    pub events: Arc<dyn EventStore>,
    pub orders: Arc<dyn OrderGateway>,
    pub validator: Arc<InputValidator>,
    pub contact: ContactExtractor,
    pub business_hours: BusinessHours,
}

impl AgentContext {
    pub fn new(
        classifier: Arc<IntentClassifier>,
        events: Arc<dyn EventStore>,
        orders: Arc<dyn OrderGateway>,
        validator: Arc<InputValidator>,
        business_hours: BusinessHours,
    ) -> Self {
        Self {
            classifier,
            events,
            orders,
            validator,
            contact: ContactExtractor::new(),
            business_hours,
        }
    }
}

pub struct BookingAgent {
    context: Arc<AgentContext>,
    engine: DraftEngine<BookingFlow>,
    draft: OrderDraft,
    offered_ticket_types: Vec<TicketType>,
    language: Language,
}

impl BookingAgent {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self {
            context,
            engine: DraftEngine::default(),
            draft: OrderDraft::new(),
            offered_ticket_types: Vec::new(),
            language: Language::En,
        }
    }

    pub fn stage(&self) -> OrderStage {
        self.draft.stage
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// A short inconclusive message ("VIP", "2") keeps the session's current
    /// language instead of falling back to English mid-conversation.
    fn update_language(&mut self, text: &str) {
        match detect_language(text) {
            Language::Vi => self.language = Language::Vi,
            Language::En => {
                if text.split_whitespace().count() >= 3 {
                    self.language = Language::En;
                }
            }
        }
    }

    /// Processes one user turn and always produces a chat reply.
    pub async fn handle_turn(&mut self, text: &str) -> String {
        self.update_language(text);
        let language = self.language;

        if contains_marker(text, RESTART_MARKERS) {
            self.restart();
            return replies::restart_ack(language);
        }
        if contains_marker(text, ABANDON_MARKERS) {
            self.abandon();
            return replies::abandon_ack(language);
        }

        let intent = match self.context.classifier.classify(text).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(
                    event_name = "intent_classification_failed",
                    error = %err,
                    transient = err.is_transient(),
                    "classifier failed, degrading to apology"
                );
                Intent::Error
            }
        };

        info!(
            event_name = "turn_dispatched",
            intent = intent.as_str(),
            stage = ?self.draft.stage,
            language = language.code(),
            "dispatching turn"
        );

        // Once contact collection started, messages are data entry: an email
        // address in "my email is an@example.com" must not divert the flow.
        let mid_collection =
            matches!(self.draft.stage, OrderStage::ProvideInfo | OrderStage::ConfirmOrder);

        match intent {
            Intent::Error => replies::apology(language),
            Intent::FreeTimeQuery if !mid_collection => self.answer_free_time().await,
            Intent::SummaryQuery if !mid_collection => self.answer_summary().await,
            Intent::SendEmail if !mid_collection => replies::email_unsupported(language),
            _ => self.advance_booking(text, intent).await,
        }
    }

    fn restart(&mut self) {
        // The restart transition is accepted from every stage.
        let _ = self.engine.apply(
            &self.draft.stage,
            &DraftEvent::RestartRequested,
            &DraftContext::default(),
        );
        self.draft.restart();
        self.offered_ticket_types.clear();
    }

    /// "Hủy"/"cancel" ends the booking attempt outright; the next message
    /// starts a fresh draft.
    fn abandon(&mut self) {
        if let Ok(outcome) = self.engine.apply(
            &self.draft.stage,
            &DraftEvent::ConversationAbandoned,
            &DraftContext::default(),
        ) {
            self.draft = OrderDraft::new();
            self.draft.stage = outcome.to;
            self.offered_ticket_types.clear();
        }
    }

    async fn advance_booking(&mut self, text: &str, intent: Intent) -> String {
        match self.draft.stage {
            OrderStage::SelectEvent => self.select_event(text, intent).await,
            OrderStage::SelectTicketType => self.select_ticket_type(text),
            OrderStage::ProvideInfo => self.collect_contact(text),
            OrderStage::ConfirmOrder => self.confirm_order(text).await,
            // A terminal draft was already cleared; start fresh.
            OrderStage::Submitted | OrderStage::Abandoned => {
                self.restart();
                self.select_event(text, intent).await
            }
        }
    }

    async fn select_event(&mut self, text: &str, intent: Intent) -> String {
        let language = self.language;

        let resolved = match self.context.classifier.resolve_event(text).await {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(event_name = "event_resolution_failed", error = %err, "retrieval failed");
                return replies::apology(language);
            }
        };
        let Some(selected) = resolved else {
            return if intent == Intent::EventLookup {
                replies::event_not_found(language)
            } else {
                replies::clarification(language)
            };
        };

        // The index can trail the system of record; the relational store
        // has the final say on whether the event still exists.
        let event = match self.context.events.get_by_id(&selected.id).await {
            Ok(Some(event)) => event,
            Ok(None) => return replies::event_not_found(language),
            Err(err) => {
                warn!(event_name = "event_fetch_failed", error = %err, "store lookup failed");
                return replies::apology(language);
            }
        };
        let ticket_types = match self.context.events.ticket_types(&event.id).await {
            Ok(ticket_types) => ticket_types,
            Err(err) => {
                warn!(event_name = "ticket_type_fetch_failed", error = %err, "store lookup failed");
                return replies::apology(language);
            }
        };
        if ticket_types.is_empty() {
            return replies::no_ticket_types(language, &event.title);
        }

        match self.engine.apply(
            &self.draft.stage,
            &DraftEvent::EventResolved,
            &DraftContext::default(),
        ) {
            Ok(outcome) => {
                self.draft.event =
                    Some(SelectedEvent { id: event.id.clone(), title: event.title.clone() });
                self.draft.stage = outcome.to;
                self.offered_ticket_types = ticket_types;
                replies::ticket_type_prompt(language, &event.title, &self.offered_ticket_types)
            }
            Err(err) => {
                warn!(event_name = "draft_transition_rejected", error = %err, "no transition");
                replies::clarification(language)
            }
        }
    }

    fn match_ticket_type(&self, text: &str) -> Option<TicketType> {
        let trimmed = text.trim();
        if let Ok(position) = trimmed.parse::<usize>() {
            if position >= 1 {
                return self.offered_ticket_types.get(position - 1).cloned();
            }
        }
        let lowered = trimmed.to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        self.offered_ticket_types
            .iter()
            .find(|ticket_type| {
                let name = ticket_type.name.to_lowercase();
                lowered.contains(&name) || name.contains(&lowered)
            })
            .cloned()
    }

    fn select_ticket_type(&mut self, text: &str) -> String {
        let language = self.language;
        let Some(chosen) = self.match_ticket_type(text) else {
            return replies::ticket_type_not_recognized(language, &self.offered_ticket_types);
        };

        match self.engine.apply(
            &self.draft.stage,
            &DraftEvent::TicketTypeChosen,
            &DraftContext::default(),
        ) {
            Ok(outcome) => {
                self.draft.ticket_type =
                    Some(SelectedTicketType { id: chosen.id.clone(), name: chosen.name.clone() });
                self.draft.stage = outcome.to;
                let missing = self.draft.missing_fields(&self.context.validator);
                replies::contact_prompt(language, &missing)
            }
            Err(err) => {
                warn!(event_name = "draft_transition_rejected", error = %err, "no transition");
                replies::clarification(language)
            }
        }
    }

    fn collect_contact(&mut self, text: &str) -> String {
        let language = self.language;
        let info = self.context.contact.extract(text);

        if let Some(email) = info.email {
            if self.context.validator.is_valid_email(&email) {
                self.draft.participant_email = Some(email);
            }
        }
        if let Some(name) = info.name {
            self.draft.participant_name = Some(name);
        }
        if let Some(phone) = info.phone {
            self.draft.participant_phone = Some(phone);
        }

        let missing = self.draft.missing_fields(&self.context.validator);
        let context = DraftContext {
            missing_required_fields: missing.iter().map(|field| field.as_str().to_string()).collect(),
        };
        match self.engine.apply(&self.draft.stage, &DraftEvent::ContactCollected, &context) {
            Ok(outcome) => {
                self.draft.stage = outcome.to;
                replies::confirmation_prompt(language, &self.draft)
            }
            Err(DraftTransitionError::MissingRequiredFields { .. }) => {
                replies::contact_prompt(language, &missing)
            }
            Err(err) => {
                warn!(event_name = "draft_transition_rejected", error = %err, "no transition");
                replies::clarification(language)
            }
        }
    }

    async fn confirm_order(&mut self, text: &str) -> String {
        let language = self.language;
        if !is_confirmation(text) {
            return replies::confirm_hint(language);
        }

        let Some(order) = self.draft.to_new_order(&self.context.validator) else {
            warn!(event_name = "draft_incomplete_at_confirm", "confirm reached with gaps");
            return replies::clarification(language);
        };

        match self.context.orders.create_order(order).await {
            Ok(order_ref) => {
                let _ = self.engine.apply(
                    &self.draft.stage,
                    &DraftEvent::OrderConfirmed,
                    &DraftContext::default(),
                );
                self.draft = OrderDraft::new();
                self.offered_ticket_types.clear();
                info!(
                    event_name = "order_submitted",
                    order_id = %order_ref.order_id,
                    "order handed to the order collaborator"
                );
                replies::order_submitted(language, &order_ref.order_id)
            }
            Err(OrderError::InsufficientInventory(_)) => {
                let name = self
                    .draft
                    .ticket_type
                    .as_ref()
                    .map(|ticket_type| ticket_type.name.clone())
                    .unwrap_or_default();
                replies::inventory_exhausted(language, &name)
            }
            Err(err) => {
                error!(event_name = "order_submission_failed", error = %err, "order failed");
                replies::apology(language)
            }
        }
    }

    async fn answer_free_time(&self) -> String {
        let language = self.language;
        match self.context.events.get_all().await {
            Ok(events) => {
                let slots = default_slots(Utc::now(), &self.context.business_hours);
                let free = free_slots(&slots, &events);
                replies::free_time_reply(language, &free)
            }
            Err(err) => {
                warn!(event_name = "event_fetch_failed", error = %err, "store lookup failed");
                replies::apology(language)
            }
        }
    }

    async fn answer_summary(&self) -> String {
        let language = self.language;
        match self.context.events.get_all().await {
            Ok(events) => {
                let buckets = bucket_events(Utc::now(), &events);
                replies::summary_reply(language, &buckets)
            }
            Err(err) => {
                warn!(event_name = "event_fetch_failed", error = %err, "store lookup failed");
                replies::apology(language)
            }
        }
    }
}
