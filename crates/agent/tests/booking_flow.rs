//! End-to-end conversational scenarios over in-memory collaborators: the
//! real classifier, registry, flow engine and synchronizer, with a
//! deterministic embedder instead of the HTTP providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use ticketry_agent::{AgentContext, AssistantService, BookingAgent, IntentClassifier, SessionRegistry};
use ticketry_core::flows::OrderStage;
use ticketry_core::schedule::BusinessHours;
use ticketry_core::security::{LimitPolicy, RateLimitConfig};
use ticketry_core::{
    ApplicationError, Event, EventDetails, EventId, EventStore, InputValidator, NewOrder,
    OrderError, OrderGateway, OrderRef, RateLimiter, SessionId, StoreError, TicketType,
    TicketTypeId,
};
use ticketry_index::{
    EmbeddingError, EmbeddingProvider, EventVectorSynchronizer, InMemoryVectorIndex,
};

const AXES: &[&[&str]] = &[
    &["rảnh", "free"],
    &["tóm tắt", "summar", "sự kiện gì"],
    &["gửi email", "send an email"],
    &["đặt vé", "book", "ticket"],
    &["gala"],
    &["workshop", "hội thảo"],
];

/// Maps keyword hits onto fixed axes so cosine scores are deterministic.
struct AxisEmbedder;

#[async_trait]
impl EmbeddingProvider for AxisEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lowered = text.to_lowercase();
        Ok(AXES
            .iter()
            .map(|keywords| {
                if keywords.iter().any(|keyword| lowered.contains(keyword)) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Timeout)
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }
}

struct InMemoryEventStore {
    events: Vec<Event>,
    ticket_types: Vec<TicketType>,
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_by_id(&self, id: &EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.events.iter().find(|event| &event.id == id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.events.clone())
    }

    async fn ticket_types(&self, event_id: &EventId) -> Result<Vec<TicketType>, StoreError> {
        Ok(self
            .ticket_types
            .iter()
            .filter(|ticket_type| &ticket_type.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct CountingOrderGateway {
    calls: AtomicUsize,
}

#[async_trait]
impl OrderGateway for CountingOrderGateway {
    async fn create_order(&self, _order: NewOrder) -> Result<OrderRef, OrderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(OrderRef { order_id: "ord-0001".to_string() })
    }
}

fn sample_events() -> (Vec<Event>, Vec<TicketType>) {
    let soon = Utc::now() + Duration::days(3);
    let gala = Event {
        id: EventId("ev-gala".to_string()),
        title: "Gala Show".to_string(),
        starts_at: soon,
        ends_at: soon + Duration::hours(3),
        details: EventDetails::Music { genre: Some("pop".to_string()), performers: Vec::new() },
    };
    let workshop = Event {
        id: EventId("ev-workshop".to_string()),
        title: "Workshop Rust".to_string(),
        starts_at: soon + Duration::days(1),
        ends_at: soon + Duration::days(1) + Duration::hours(2),
        details: EventDetails::Workshop { instructor: None, capacity: Some(40) },
    };
    let ticket_types = vec![
        TicketType {
            id: TicketTypeId("tt-vip".to_string()),
            event_id: gala.id.clone(),
            name: "VIP".to_string(),
            price: "1500000".parse().expect("decimal"),
            quantity_available: 10,
        },
        TicketType {
            id: TicketTypeId("tt-std".to_string()),
            event_id: gala.id.clone(),
            name: "Thường".to_string(),
            price: "500000".parse().expect("decimal"),
            quantity_available: 100,
        },
    ];
    (vec![gala, workshop], ticket_types)
}

struct Harness {
    service: AssistantService,
    registry: Arc<SessionRegistry>,
    orders: Arc<CountingOrderGateway>,
}

async fn harness_with(embedder: Arc<dyn EmbeddingProvider>, limits: RateLimitConfig) -> Harness {
    let (events, ticket_types) = sample_events();
    let store = Arc::new(InMemoryEventStore { events, ticket_types });
    let index = Arc::new(InMemoryVectorIndex::new());
    let classifier = Arc::new(IntentClassifier::new(embedder.clone(), index.clone(), 0.5, 5));

    // Seeding tolerates a broken embedder; the classifier surfaces the
    // failure per turn instead.
    let _ = classifier.seed_intent_examples().await;
    let synchronizer = EventVectorSynchronizer::new(embedder, index);
    let _ = synchronizer.sync_all(store.as_ref()).await;

    let orders = Arc::new(CountingOrderGateway::default());
    let context = Arc::new(AgentContext::new(
        classifier,
        store,
        orders.clone(),
        Arc::new(InputValidator::new()),
        BusinessHours::default(),
    ));
    let registry = Arc::new(SessionRegistry::with_factory(Arc::new(move || {
        BookingAgent::new(context.clone())
    })));
    let service = AssistantService::new(
        registry.clone(),
        Arc::new(InputValidator::new()),
        Arc::new(RateLimiter::new(limits)),
    );

    Harness { service, registry, orders }
}

async fn harness() -> Harness {
    harness_with(Arc::new(AxisEmbedder), RateLimitConfig::default()).await
}

async fn stage_of(registry: &SessionRegistry, session_id: &SessionId) -> OrderStage {
    registry.get(session_id).expect("session exists").lock().await.stage()
}

#[tokio::test]
async fn vietnamese_booking_conversation_reaches_submission() {
    let harness = harness().await;
    let session = SessionId("sess-gala".to_string());

    let reply = harness
        .service
        .reply("user-1", &session, "Tôi muốn đặt vé cho sự kiện Gala Show")
        .await
        .expect("turn 1");
    assert!(reply.contains("VIP"), "ticket types listed: {reply}");
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::SelectTicketType);

    let reply = harness.service.reply("user-1", &session, "VIP").await.expect("turn 2");
    assert!(reply.contains("họ tên"), "contact prompt: {reply}");
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::ProvideInfo);

    let reply = harness
        .service
        .reply("user-1", &session, "Tên tôi là Nguyen Van An, email an@example.com")
        .await
        .expect("turn 3");
    assert!(reply.contains("Nguyen Van An"), "confirmation summary: {reply}");
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::ConfirmOrder);

    let reply = harness.service.reply("user-1", &session, "Xác nhận").await.expect("turn 4");
    assert!(reply.contains("ord-0001"), "order reference: {reply}");
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 1);

    // The draft was cleared; the session is ready for a new booking.
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::SelectEvent);
}

#[tokio::test]
async fn non_confirmation_at_the_confirm_stage_does_not_submit() {
    let harness = harness().await;
    let session = SessionId("sess-decline".to_string());

    harness
        .service
        .reply("user-1", &session, "Tôi muốn đặt vé cho sự kiện Gala Show")
        .await
        .expect("turn 1");
    harness.service.reply("user-1", &session, "VIP").await.expect("turn 2");
    harness
        .service
        .reply("user-1", &session, "Tên tôi là Nguyen Van An, email an@example.com")
        .await
        .expect("turn 3");
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::ConfirmOrder);

    // "book" contains "ok"; wanting a different event is not agreement.
    let reply = harness
        .service
        .reply("user-1", &session, "I want to book a different event instead")
        .await
        .expect("decline");
    assert!(!reply.is_empty());
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 0);
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::ConfirmOrder);

    let reply = harness.service.reply("user-1", &session, "Confirm").await.expect("confirm");
    assert!(reply.contains("ord-0001"), "order reference: {reply}");
    assert_eq!(harness.orders.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_abandons_the_draft_and_the_next_message_starts_fresh() {
    let harness = harness().await;
    let session = SessionId("sess-abandon".to_string());

    harness
        .service
        .reply("user-1", &session, "Tôi muốn đặt vé cho sự kiện Gala Show")
        .await
        .expect("turn 1");
    let reply =
        harness.service.reply("user-1", &session, "Thôi, hủy giúp tôi").await.expect("cancel");
    assert!(!reply.is_empty());
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::Abandoned);

    let reply = harness
        .service
        .reply("user-1", &session, "Tôi muốn đặt vé cho sự kiện Gala Show")
        .await
        .expect("new booking");
    assert!(reply.contains("VIP"), "ticket types listed: {reply}");
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::SelectTicketType);
}

#[tokio::test]
async fn restart_clears_collected_fields_from_any_stage() {
    let harness = harness().await;
    let session = SessionId("sess-restart".to_string());

    harness
        .service
        .reply("user-1", &session, "Tôi muốn đặt vé cho sự kiện Gala Show")
        .await
        .expect("turn 1");
    harness.service.reply("user-1", &session, "VIP").await.expect("turn 2");

    let reply = harness.service.reply("user-1", &session, "Làm lại từ đầu").await.expect("restart");
    assert!(!reply.is_empty());

    let handle = harness.registry.get(&session).expect("session exists");
    let agent = handle.lock().await;
    assert_eq!(agent.stage(), OrderStage::SelectEvent);
    assert!(agent.draft().event.is_none());
    assert!(agent.draft().ticket_type.is_none());
}

#[tokio::test]
async fn unknown_utterance_is_a_self_loop_with_clarification() {
    let harness = harness().await;
    let session = SessionId("sess-unknown".to_string());

    let reply =
        harness.service.reply("user-1", &session, "mấy giờ rồi nhỉ").await.expect("turn");
    assert!(!reply.is_empty());
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::SelectEvent);
}

#[tokio::test]
async fn embedding_failure_yields_apology_without_advancing() {
    let harness =
        harness_with(Arc::new(FailingEmbedder), RateLimitConfig::default()).await;
    let session = SessionId("sess-degraded".to_string());

    let reply = harness
        .service
        .reply("user-1", &session, "Tôi muốn đặt vé cho sự kiện Gala Show")
        .await
        .expect("degraded turn still replies");
    assert!(reply.contains("Xin lỗi"), "localized apology: {reply}");
    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::SelectEvent);
}

#[tokio::test]
async fn hostile_input_is_rejected_before_any_processing() {
    let harness = harness().await;
    let session = SessionId("sess-hostile".to_string());

    let error = harness
        .service
        .reply("user-1", &session, "<script>alert(1)</script>")
        .await
        .expect_err("gate rejects");
    assert!(matches!(error, ApplicationError::Validation { .. }));

    // The gate fired before the registry was touched.
    assert_eq!(harness.registry.count(), 0);
}

#[tokio::test]
async fn message_quota_is_enforced_per_user() {
    let limits = RateLimitConfig {
        message: LimitPolicy { max_requests: 2, window: std::time::Duration::from_secs(60) },
        ..RateLimitConfig::default()
    };
    let harness = harness_with(Arc::new(AxisEmbedder), limits).await;
    let session = SessionId("sess-quota".to_string());

    harness.service.reply("user-1", &session, "Tuần này có sự kiện gì?").await.expect("first");
    harness.service.reply("user-1", &session, "Tuần này có sự kiện gì?").await.expect("second");

    let error = harness
        .service
        .reply("user-1", &session, "Tuần này có sự kiện gì?")
        .await
        .expect_err("third is throttled");
    assert!(matches!(error, ApplicationError::RateLimited { .. }));

    // A different user is unaffected.
    harness.service.reply("user-2", &session, "Tuần này có sự kiện gì?").await.expect("other user");
}

#[tokio::test]
async fn concurrent_first_access_creates_exactly_one_agent() {
    let harness = harness().await;
    let session = SessionId("sess-concurrent".to_string());

    let (a, b) = tokio::join!(
        async { harness.registry.get_or_create(&session) },
        async { harness.registry.get_or_create(&session) },
    );
    let a = a.expect("first handle");
    let b = b.expect("second handle");

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(harness.registry.count(), 1);
}

#[tokio::test]
async fn free_time_and_summary_queries_answer_without_touching_the_draft() {
    let harness = harness().await;
    let session = SessionId("sess-schedule".to_string());

    let summary =
        harness.service.reply("user-1", &session, "Tuần này có sự kiện gì?").await.expect("summary");
    assert!(!summary.is_empty());

    let free = harness
        .service
        .reply("user-1", &session, "Khi nào tôi rảnh?")
        .await
        .expect("free time");
    assert!(!free.is_empty());

    assert_eq!(stage_of(&harness.registry, &session).await, OrderStage::SelectEvent);
}
