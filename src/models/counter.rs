//! Daily counter model

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use sqlx::FromRow;

/// Rate-limited action kinds tracked per platform day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterKind {
    AdsCreated,
    PhotosSent,
}

impl CounterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::AdsCreated => "ads_created",
            CounterKind::PhotosSent => "photos_sent",
        }
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored per-(account, kind) daily counter.
///
/// Reset is lazy: a row whose `last_reset_date` is before today counts as
/// zero, there is no background job zeroing rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyCounter {
    pub account_token: String,
    pub kind: String,
    pub count: i32,
    pub last_reset_date: NaiveDate,
}

impl DailyCounter {
    /// The logical count for `today`, applying the lazy reset rule
    pub fn logical_count(&self, today: NaiveDate) -> i32 {
        if self.last_reset_date < today {
            0
        } else {
            self.count
        }
    }
}

/// Outcome of a quota consumption attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub used: i32,
    /// None means unlimited for this tier
    pub limit: Option<i32>,
    pub remaining: Option<i32>,
}
