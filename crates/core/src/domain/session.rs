use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// One ongoing dialogue between a user and the booking agent.
/// Structurally immutable after creation; removed on explicit clear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub message: String,
    pub is_from_user: bool,
    pub created_at: DateTime<Utc>,
}
