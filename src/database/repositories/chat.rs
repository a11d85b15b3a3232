//! Chat request and message repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::chat::{ChatRequest, Message};
use crate::utils::errors::AnonimkaError;

const CHAT_COLUMNS: &str = "id, initiator, recipient, listing_id, accepted, blocked_by, \
    staged_message, created_at, last_message_at";

const MESSAGE_COLUMNS: &str = "id, chat_request_id, sender, body, photo_ref, reply_to, \
    is_read, is_delivered, created_at";

#[derive(Debug, Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending chat request carrying the staged first message.
    /// When the pair already has a request for this listing the existing
    /// row is returned unchanged, flagged with `created = false` so the
    /// caller knows not to treat it as a fresh request.
    pub async fn create_pending(
        &self,
        initiator: &str,
        recipient: &str,
        listing_id: Option<i64>,
        staged_message: &str,
    ) -> Result<(ChatRequest, bool), AnonimkaError> {
        let inserted = sqlx::query_as::<_, ChatRequest>(&format!(
            r#"
            INSERT INTO chat_requests (initiator, recipient, listing_id, staged_message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(initiator)
        .bind(recipient)
        .bind(listing_id)
        .bind(staged_message)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(request) = inserted {
            return Ok((request, true));
        }

        let existing = self
            .find_by_pair(initiator, recipient, listing_id)
            .await?
            .ok_or(AnonimkaError::ChatNotFound { chat_id: 0 })?;
        Ok((existing, false))
    }

    pub async fn find_by_id(&self, chat_id: i64) -> Result<Option<ChatRequest>, AnonimkaError> {
        let request = sqlx::query_as::<_, ChatRequest>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_requests WHERE id = $1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    pub async fn find_by_pair(
        &self,
        initiator: &str,
        recipient: &str,
        listing_id: Option<i64>,
    ) -> Result<Option<ChatRequest>, AnonimkaError> {
        let request = sqlx::query_as::<_, ChatRequest>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_requests \
             WHERE initiator = $1 AND recipient = $2 AND listing_id IS NOT DISTINCT FROM $3"
        ))
        .bind(initiator)
        .bind(recipient)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Count pending requests targeting one listing, across all initiators
    pub async fn count_pending_for_listing(&self, listing_id: i64) -> Result<i64, AnonimkaError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_requests \
             WHERE listing_id = $1 AND accepted = FALSE AND blocked_by IS NULL"
        )
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Count pending direct requests (no listing) addressed to one recipient
    pub async fn count_pending_for_recipient(&self, recipient: &str) -> Result<i64, AnonimkaError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_requests \
             WHERE recipient = $1 AND listing_id IS NULL AND accepted = FALSE AND blocked_by IS NULL"
        )
        .bind(recipient)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Lock a pending request addressed to `recipient` for the accept flow
    pub async fn find_pending_for_update(
        &self,
        conn: &mut PgConnection,
        chat_id: i64,
        recipient: &str,
    ) -> Result<Option<ChatRequest>, AnonimkaError> {
        let request = sqlx::query_as::<_, ChatRequest>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_requests \
             WHERE id = $1 AND recipient = $2 AND accepted = FALSE AND blocked_by IS NULL \
             FOR UPDATE"
        ))
        .bind(chat_id)
        .bind(recipient)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(request)
    }

    /// Mark the request accepted and drop the staged message text
    pub async fn mark_accepted(
        &self,
        conn: &mut PgConnection,
        chat_id: i64,
    ) -> Result<ChatRequest, AnonimkaError> {
        let request = sqlx::query_as::<_, ChatRequest>(&format!(
            r#"
            UPDATE chat_requests
            SET accepted = TRUE, staged_message = NULL, last_message_at = $2
            WHERE id = $1
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(chat_id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(request)
    }

    /// Delete a pending request. Returns whether a row was removed.
    pub async fn delete_pending(&self, chat_id: i64, recipient: &str) -> Result<bool, AnonimkaError> {
        let result = sqlx::query(
            "DELETE FROM chat_requests WHERE id = $1 AND recipient = $2 AND accepted = FALSE"
        )
        .bind(chat_id)
        .bind(recipient)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the blocker if the chat is not already blocked
    pub async fn set_blocked(&self, chat_id: i64, blocker: &str) -> Result<bool, AnonimkaError> {
        let result = sqlx::query(
            "UPDATE chat_requests SET blocked_by = $2 WHERE id = $1 AND blocked_by IS NULL"
        )
        .bind(chat_id)
        .bind(blocker)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Clear the block, only for the participant that set it
    pub async fn clear_blocked(&self, chat_id: i64, blocker: &str) -> Result<bool, AnonimkaError> {
        let result = sqlx::query(
            "UPDATE chat_requests SET blocked_by = NULL WHERE id = $1 AND blocked_by = $2"
        )
        .bind(chat_id)
        .bind(blocker)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a message row for an accepted chat
    pub async fn insert_message(
        &self,
        conn: &mut PgConnection,
        chat_id: i64,
        sender: &str,
        body: Option<&str>,
        photo_ref: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<Message, AnonimkaError> {
        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (chat_request_id, sender, body, photo_ref, reply_to, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(chat_id)
        .bind(sender)
        .bind(body)
        .bind(photo_ref)
        .bind(reply_to)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(message)
    }

    pub async fn touch_last_message(
        &self,
        conn: &mut PgConnection,
        chat_id: i64,
    ) -> Result<(), AnonimkaError> {
        sqlx::query("UPDATE chat_requests SET last_message_at = $2 WHERE id = $1")
            .bind(chat_id)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Mark everything the other participant sent in this chat as read
    pub async fn mark_messages_read(&self, chat_id: i64, reader: &str) -> Result<u64, AnonimkaError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE \
             WHERE chat_request_id = $1 AND sender != $2 AND is_read = FALSE"
        )
        .bind(chat_id)
        .bind(reader)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete one message, only for its sender. Returns whether a row was removed.
    pub async fn delete_own_message(&self, message_id: i64, sender: &str) -> Result<bool, AnonimkaError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND sender = $2")
            .bind(message_id)
            .bind(sender)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List messages of a chat, oldest first
    pub async fn list_messages(&self, chat_id: i64, limit: i64) -> Result<Vec<Message>, AnonimkaError> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE chat_request_id = $1 ORDER BY created_at ASC LIMIT $2"
        ))
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Pool handle for service-level transactions
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
