//! Referral record model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One record per referred account. `reward_given` transitions false -> true
/// exactly once; the transition doubles as the lock for reward issuance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferralRecord {
    pub id: i64,
    pub referrer_token: String,
    pub referred_token: String,
    pub reward_given: bool,
    pub reward_given_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReferralRecord {
    pub fn is_self_referral(&self) -> bool {
        self.referrer_token == self.referred_token
    }

    /// Deterministic ledger transaction id for this record's reward
    pub fn reward_transaction_id(&self) -> String {
        format!("referral-{}", self.id)
    }
}

/// Tagged outcome of a reward claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardOutcome {
    /// Reward credited; referrer premium now runs until this instant
    Granted { premium_until: DateTime<Utc> },
    /// Reward was already paid for this record
    AlreadyGranted,
    /// Record resolved without reward
    SelfReferral,
    /// The referred account never arrived through a referral link
    NoReferral,
}
