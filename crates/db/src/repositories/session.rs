use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use ticketry_core::domain::session::{ConversationSession, SessionId, TranscriptMessage};

use super::RepositoryError;
use crate::DbPool;

/// Conversation sessions and their transcripts, for the surrounding UI's
/// list/create/history surface.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<ConversationSession, RepositoryError> {
        let id = SessionId(Uuid::new_v4().to_string());
        sqlx::query("INSERT INTO conversation_session (id, user_id, title) VALUES (?, ?, ?)")
            .bind(&id.0)
            .bind(user_id)
            .bind(title)
            .execute(&self.pool)
            .await?;

        self.find(user_id, &id)
            .await?
            .ok_or_else(|| RepositoryError::Decode("created session not readable".to_string()))
    }

    /// Creates the session row if it does not exist yet. Used by the reply
    /// path, where a first message can open a conversation implicitly.
    pub async fn ensure(
        &self,
        user_id: &str,
        session_id: &SessionId,
        default_title: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversation_session (id, user_id, title) VALUES (?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&session_id.0)
        .bind(user_id)
        .bind(default_title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(
        &self,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, title, created_at, updated_at
             FROM conversation_session WHERE id = ? AND user_id = ?",
        )
        .bind(&session_id.0)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ConversationSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, created_at, updated_at
             FROM conversation_session WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(session_from_row).collect()
    }

    pub async fn remove(
        &self,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_session WHERE id = ? AND user_id = ?")
            .bind(&session_id.0)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn append_message(
        &self,
        session_id: &SessionId,
        message: &str,
        is_from_user: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO session_message (session_id, message, is_from_user) VALUES (?, ?, ?)")
            .bind(&session_id.0)
            .bind(message)
            .bind(is_from_user)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE conversation_session SET updated_at = datetime('now') WHERE id = ?")
            .bind(&session_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn history(
        &self,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<Vec<TranscriptMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT m.message, m.is_from_user, m.created_at
             FROM session_message m
             JOIN conversation_session s ON s.id = m.session_id
             WHERE m.session_id = ? AND s.user_id = ?
             ORDER BY m.id ASC",
        )
        .bind(&session_id.0)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let created_at: DateTime<Utc> = row.try_get("created_at")?;
                Ok(TranscriptMessage {
                    message: row.try_get("message")?,
                    is_from_user: row.try_get("is_from_user")?,
                    created_at,
                })
            })
            .collect()
    }
}

fn session_from_row(row: SqliteRow) -> Result<ConversationSession, RepositoryError> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok(ConversationSession {
        id: SessionId(row.try_get("id")?),
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        created_at,
        updated_at,
    })
}
