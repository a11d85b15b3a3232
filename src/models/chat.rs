//! Chat request and message models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One chat request per (initiator, recipient, listing) triple.
///
/// State is carried by two columns: `accepted = false, blocked_by = NULL` is
/// pending, `accepted = true` is active, a set `blocked_by` is terminal for
/// new messages. Rejection deletes the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatRequest {
    pub id: i64,
    pub initiator: String,
    pub recipient: String,
    pub listing_id: Option<i64>,
    pub accepted: bool,
    pub blocked_by: Option<String>,
    pub staged_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ChatRequest {
    pub fn is_pending(&self) -> bool {
        !self.accepted && self.blocked_by.is_none()
    }

    pub fn is_participant(&self, token: &str) -> bool {
        self.initiator == token || self.recipient == token
    }

    /// The other participant relative to `token`
    pub fn other_participant(&self, token: &str) -> Option<&str> {
        if self.initiator == token {
            Some(self.recipient.as_str())
        } else if self.recipient == token {
            Some(self.initiator.as_str())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub chat_request_id: i64,
    pub sender: String,
    pub body: Option<String>,
    pub photo_ref: Option<String>,
    pub reply_to: Option<i64>,
    pub is_read: bool,
    pub is_delivered: bool,
    pub created_at: DateTime<Utc>,
}

/// Outbound message content, body and/or a photo reference
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub body: Option<String>,
    pub photo_ref: Option<String>,
    pub reply_to: Option<i64>,
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self { body: Some(body.into()), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.body.as_deref().map(|b| b.trim().is_empty()).unwrap_or(true)
            && self.photo_ref.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(initiator: &str, recipient: &str) -> ChatRequest {
        ChatRequest {
            id: 1,
            initiator: initiator.to_string(),
            recipient: recipient.to_string(),
            listing_id: Some(10),
            accepted: false,
            blocked_by: None,
            staged_message: Some("hi".to_string()),
            created_at: Utc::now(),
            last_message_at: None,
        }
    }

    #[test]
    fn test_other_participant() {
        let req = request("a", "b");
        assert_eq!(req.other_participant("a"), Some("b"));
        assert_eq!(req.other_participant("b"), Some("a"));
        assert_eq!(req.other_participant("c"), None);
    }

    #[test]
    fn test_pending_state() {
        let mut req = request("a", "b");
        assert!(req.is_pending());
        req.accepted = true;
        assert!(!req.is_pending());
        req.accepted = false;
        req.blocked_by = Some("b".to_string());
        assert!(!req.is_pending());
    }

    #[test]
    fn test_message_content_empty() {
        assert!(MessageContent::default().is_empty());
        assert!(MessageContent::text("   ").is_empty());
        assert!(!MessageContent::text("hello").is_empty());
        let photo_only = MessageContent { photo_ref: Some("p".to_string()), ..Default::default() };
        assert!(!photo_only.is_empty());
    }
}
