//! Intent classification and fuzzy entity resolution over the vector index.
//! The classifier is pure with respect to conversation state; the booking
//! agent decides what to do with its output.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use ticketry_core::{EventId, SelectedEvent};
use ticketry_index::{
    EmbeddingError, EmbeddingProvider, SearchFilter, SearchHit, VectorIndex, VectorIndexError,
    VectorRecord, EVENT_KIND,
};

pub const INTENT_SEED_KIND: &str = "intent_seed";

/// Classified purpose of one user utterance. `Error` is reserved for
/// classifier-internal failures, distinct from genuinely unclassifiable
/// input (`Unknown`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    FreeTimeQuery,
    SummaryQuery,
    SendEmail,
    EventLookup,
    Unknown,
    Error,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreeTimeQuery => "free_time_query",
            Self::SummaryQuery => "summary_query",
            Self::SendEmail => "send_email",
            Self::EventLookup => "event_lookup",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }

    fn from_payload(value: &str) -> Self {
        match value {
            "free_time_query" => Self::FreeTimeQuery,
            "summary_query" => Self::SummaryQuery,
            "send_email" => Self::SendEmail,
            "event_lookup" => Self::EventLookup,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] VectorIndexError),
}

impl ClassifierError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Embedding(err) => err.is_transient(),
            Self::Index(err) => err.is_transient(),
        }
    }
}

/// Canonical phrases indexed under [`INTENT_SEED_KIND`]. Classification is
/// nearest-neighbor over these records.
const INTENT_SEEDS: &[(Intent, &str)] = &[
    (Intent::FreeTimeQuery, "Khi nào tôi rảnh?"),
    (Intent::FreeTimeQuery, "Tuần này tôi còn khung giờ rảnh nào không?"),
    (Intent::FreeTimeQuery, "When am I free this week?"),
    (Intent::FreeTimeQuery, "Show me my free time slots"),
    (Intent::SummaryQuery, "Tuần này có sự kiện gì?"),
    (Intent::SummaryQuery, "Tóm tắt các sự kiện sắp tới"),
    (Intent::SummaryQuery, "What events are happening this week?"),
    (Intent::SummaryQuery, "Summarize the upcoming events"),
    (Intent::SendEmail, "Gửi email cho ban tổ chức"),
    (Intent::SendEmail, "Send an email to the organizer"),
    (Intent::SendEmail, "Email the event details to me"),
    (Intent::EventLookup, "Tôi muốn đặt vé cho sự kiện"),
    (Intent::EventLookup, "Tìm sự kiện cho tôi"),
    (Intent::EventLookup, "I want to book tickets for an event"),
    (Intent::EventLookup, "Find me the music show"),
];

pub struct IntentClassifier {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    similarity_threshold: f32,
    top_k: usize,
}

impl IntentClassifier {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        similarity_threshold: f32,
        top_k: usize,
    ) -> Self {
        Self { embedder, index, similarity_threshold, top_k: top_k.max(1) }
    }

    /// Maps one utterance to an [`Intent`]. Blank input short-circuits to
    /// `Unknown` without touching the embedding provider.
    pub async fn classify(&self, text: &str) -> Result<Intent, ClassifierError> {
        if text.trim().is_empty() {
            return Ok(Intent::Unknown);
        }

        let vector = self.embedder.embed(text).await?;
        let filter = SearchFilter { kind: INTENT_SEED_KIND.to_string() };
        let hits = self.index.search(&vector, &filter, self.top_k).await?;

        let intent = hits
            .first()
            .filter(|hit| hit.score >= self.similarity_threshold)
            .and_then(|hit| hit.payload.get("intent").and_then(Value::as_str))
            .map(Intent::from_payload)
            .unwrap_or(Intent::Unknown);

        debug!(event_name = "intent_classified", intent = intent.as_str(), "classified utterance");
        Ok(intent)
    }

    /// Resolves a fuzzy event reference to a canonical record. `None` when
    /// nothing clears the similarity threshold.
    pub async fn resolve_event(&self, text: &str) -> Result<Option<SelectedEvent>, ClassifierError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let vector = self.embedder.embed(text).await?;
        let filter = SearchFilter { kind: EVENT_KIND.to_string() };
        let mut hits: Vec<SearchHit> = self
            .index
            .search(&vector, &filter, self.top_k)
            .await?
            .into_iter()
            .filter(|hit| hit.score >= self.similarity_threshold)
            .collect();

        // Highest score wins; exact ties go to the event starting soonest
        // in the future, which the payload carries as an epoch value.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| starts_at_epoch(b).cmp(&starts_at_epoch(a)))
        });

        Ok(hits.first().map(|hit| SelectedEvent {
            id: EventId(hit.id.clone()),
            title: hit
                .payload
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }))
    }

    /// Event title the input most plausibly refers to; empty string when
    /// nothing clears the threshold.
    pub async fn extract_event_name(&self, text: &str) -> Result<String, ClassifierError> {
        Ok(self.resolve_event(text).await?.map(|event| event.title).unwrap_or_default())
    }

    /// Bulk-upserts the canonical intent phrases, one record per phrase.
    /// Deterministic ids make re-seeding idempotent.
    pub async fn seed_intent_examples(&self) -> Result<usize, ClassifierError> {
        for (position, (intent, phrase)) in INTENT_SEEDS.iter().enumerate() {
            let vector = self.embedder.embed(phrase).await?;
            let record = VectorRecord {
                kind: INTENT_SEED_KIND.to_string(),
                id: format!("{}-{position:02}", intent.as_str()),
                vector,
                payload: json!({ "intent": intent.as_str(), "phrase": phrase }),
            };
            self.index.upsert(record).await?;
        }
        Ok(INTENT_SEEDS.len())
    }
}

fn starts_at_epoch(hit: &SearchHit) -> i64 {
    hit.payload.get("starts_at_epoch").and_then(Value::as_i64).unwrap_or(i64::MIN)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use ticketry_index::{
        EmbeddingError, EmbeddingProvider, InMemoryVectorIndex, VectorIndex, VectorRecord,
        EVENT_KIND,
    };

    use super::{Intent, IntentClassifier, INTENT_SEED_KIND};

    /// Keyword axes keep similarity fully deterministic in tests.
    struct AxisEmbedder {
        calls: AtomicUsize,
    }

    impl AxisEmbedder {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    const AXES: &[&[&str]] = &[
        &["rảnh", "free"],
        &["tóm tắt", "summar", "sự kiện gì", "what events"],
        &["email"],
        &["đặt vé", "book", "ticket"],
        &["gala"],
        &["workshop", "hội thảo"],
    ];

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
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

    async fn classifier_with_seeds() -> (IntentClassifier, Arc<AxisEmbedder>, Arc<InMemoryVectorIndex>) {
        let embedder = Arc::new(AxisEmbedder::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let classifier = IntentClassifier::new(embedder.clone(), index.clone(), 0.5, 5);
        classifier.seed_intent_examples().await.expect("seed intents");
        (classifier, embedder, index)
    }

    async fn index_event(index: &InMemoryVectorIndex, embedder: &AxisEmbedder, id: &str, title: &str, epoch: i64) {
        let vector = embedder.embed(title).await.expect("embed");
        index
            .upsert(VectorRecord {
                kind: EVENT_KIND.to_string(),
                id: id.to_string(),
                vector,
                payload: json!({ "title": title, "starts_at_epoch": epoch }),
            })
            .await
            .expect("upsert event");
    }

    #[tokio::test]
    async fn blank_input_is_unknown_without_an_embedding_call() {
        let (classifier, embedder, _) = classifier_with_seeds().await;
        let calls_after_seeding = embedder.call_count();

        let intent = classifier.classify("   ").await.expect("classify");

        assert_eq!(intent, Intent::Unknown);
        assert_eq!(embedder.call_count(), calls_after_seeding);
    }

    #[tokio::test]
    async fn utterances_map_to_their_intents() {
        let (classifier, _, _) = classifier_with_seeds().await;

        assert_eq!(
            classifier.classify("Tuần này tôi rảnh lúc nào?").await.expect("classify"),
            Intent::FreeTimeQuery
        );
        assert_eq!(
            classifier.classify("Tóm tắt sự kiện tuần này giúp tôi").await.expect("classify"),
            Intent::SummaryQuery
        );
        assert_eq!(
            classifier.classify("Tôi muốn đặt vé").await.expect("classify"),
            Intent::EventLookup
        );
        assert_eq!(
            classifier.classify("mấy giờ rồi nhỉ").await.expect("classify"),
            Intent::Unknown
        );
    }

    #[tokio::test]
    async fn event_resolution_respects_threshold() {
        let (classifier, embedder, index) = classifier_with_seeds().await;
        index_event(&index, &embedder, "ev-gala", "Gala Show", 100).await;

        let resolved = classifier
            .resolve_event("Tôi muốn đặt vé cho sự kiện Gala Show")
            .await
            .expect("resolve");
        assert_eq!(resolved.expect("match").title, "Gala Show");

        let unresolved = classifier.resolve_event("một sự kiện nào đó").await.expect("resolve");
        assert!(unresolved.is_none());
    }

    #[tokio::test]
    async fn score_ties_break_on_most_recent_start() {
        let (classifier, embedder, index) = classifier_with_seeds().await;
        // Identical vectors, so cosine scores tie exactly.
        index_event(&index, &embedder, "ev-old", "Gala Show", 100).await;
        index_event(&index, &embedder, "ev-new", "Gala Night", 200).await;

        let resolved = classifier.resolve_event("gala").await.expect("resolve").expect("match");
        assert_eq!(resolved.id.0, "ev-new");
    }

    #[tokio::test]
    async fn reseeding_does_not_duplicate_records() {
        let (classifier, _, index) = classifier_with_seeds().await;
        let before = index.len();

        classifier.seed_intent_examples().await.expect("reseed");

        assert_eq!(index.len(), before);
    }

    #[test]
    fn seed_kind_is_distinct_from_event_kind() {
        assert_ne!(INTENT_SEED_KIND, EVENT_KIND);
    }
}
