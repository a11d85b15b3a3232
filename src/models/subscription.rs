//! Subscription transaction model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Recorded ledger entry for one external purchase or reward credit.
/// `transaction_id` is unique at the storage layer; replays of the same id
/// return the originally granted expiry instead of extending again.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionTransaction {
    pub id: i64,
    pub account_token: String,
    pub months: i32,
    pub amount_stars: i64,
    pub transaction_id: String,
    pub payment_method: String,
    pub premium_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Resolved entitlement of an account at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub premium: bool,
    pub until: Option<DateTime<Utc>>,
}

impl Entitlement {
    pub fn free() -> Self {
        Self { premium: false, until: None }
    }
}
