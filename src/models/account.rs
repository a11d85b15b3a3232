//! Account model
//!
//! An account is keyed by a stable opaque token. The Telegram id, when the
//! account is linked, is only a secondary lookup key.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub token: String,
    pub telegram_id: Option<i64>,
    pub display_nickname: Option<String>,
    pub nickname_changed_at: Option<DateTime<Utc>>,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub is_banned: bool,
    pub bot_blocked: bool,
    pub device_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account has a nonempty nickname assigned
    pub fn has_nickname(&self) -> bool {
        self.display_nickname
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub telegram_id: Option<i64>,
    pub display_nickname: Option<String>,
}

/// Legacy entitlement row keyed by opaque token only (old web onboarding path)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LegacyEntitlement {
    pub token: String,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
}
