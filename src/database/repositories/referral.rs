//! Referral repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::referral::ReferralRecord;
use crate::utils::errors::AnonimkaError;

const REFERRAL_COLUMNS: &str = "id, referrer_token, referred_token, reward_given, reward_given_at, created_at";

#[derive(Debug, Clone)]
pub struct ReferralRepository {
    pool: PgPool,
}

impl ReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a referral. A referred account keeps its first referrer;
    /// repeated registrations are benign no-ops returning None.
    pub async fn create(
        &self,
        referrer_token: &str,
        referred_token: &str,
    ) -> Result<Option<ReferralRecord>, AnonimkaError> {
        let record = sqlx::query_as::<_, ReferralRecord>(&format!(
            r#"
            INSERT INTO referrals (referrer_token, referred_token, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (referred_token) DO NOTHING
            RETURNING {REFERRAL_COLUMNS}
            "#
        ))
        .bind(referrer_token)
        .bind(referred_token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_referred(&self, referred_token: &str) -> Result<Option<ReferralRecord>, AnonimkaError> {
        let record = sqlx::query_as::<_, ReferralRecord>(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referred_token = $1"
        ))
        .bind(referred_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Flip `reward_given` false -> true. The conditional update is the lock
    /// guarding reward issuance: only one caller observes a row change.
    /// Runs inside the issuing transaction so a failed ledger credit rolls
    /// the flip back.
    pub async fn try_mark_rewarded(
        &self,
        conn: &mut PgConnection,
        record_id: i64,
    ) -> Result<bool, AnonimkaError> {
        let result = sqlx::query(
            "UPDATE referrals SET reward_given = TRUE, reward_given_at = $2 \
             WHERE id = $1 AND reward_given = FALSE"
        )
        .bind(record_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Referral statistics for one referrer: (total, rewarded)
    pub async fn stats_for_referrer(&self, referrer_token: &str) -> Result<(i64, i64), AnonimkaError> {
        let (total, rewarded): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE reward_given) \
             FROM referrals WHERE referrer_token = $1"
        )
        .bind(referrer_token)
        .fetch_one(&self.pool)
        .await?;

        Ok((total, rewarded))
    }

    /// Pool handle for service-level transactions
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
