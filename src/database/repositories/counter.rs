//! Daily counter repository implementation
//!
//! The increment path is a single guarded INSERT .. ON CONFLICT DO UPDATE:
//! two concurrent calls for the last remaining slot cannot both succeed,
//! because the guard re-evaluates against the committed row.

use sqlx::PgPool;
use chrono::{DateTime, NaiveDate, Utc};
use crate::models::counter::DailyCounter;
use crate::utils::errors::AnonimkaError;

#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically increment the counter for `today` if the logical count is
    /// below `limit`. Returns the new count on success, None when the limit
    /// was already reached. The date comparison inside the statement applies
    /// the lazy daily reset.
    pub async fn try_increment(
        &self,
        account_token: &str,
        kind: &str,
        today: NaiveDate,
        limit: i32,
    ) -> Result<Option<i32>, AnonimkaError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO daily_counters (account_token, kind, count, last_reset_date)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (account_token, kind) DO UPDATE
            SET count = CASE
                    WHEN daily_counters.last_reset_date < $3 THEN 1
                    ELSE daily_counters.count + 1
                END,
                last_reset_date = $3
            WHERE daily_counters.last_reset_date < $3
               OR daily_counters.count < $4
            RETURNING count
            "#
        )
        .bind(account_token)
        .bind(kind)
        .bind(today)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(count,)| count))
    }

    /// Increment without a cap (unlimited tiers still track usage)
    pub async fn increment(
        &self,
        account_token: &str,
        kind: &str,
        today: NaiveDate,
    ) -> Result<i32, AnonimkaError> {
        let (count,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO daily_counters (account_token, kind, count, last_reset_date)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (account_token, kind) DO UPDATE
            SET count = CASE
                    WHEN daily_counters.last_reset_date < $3 THEN 1
                    ELSE daily_counters.count + 1
                END,
                last_reset_date = $3
            RETURNING count
            "#
        )
        .bind(account_token)
        .bind(kind)
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Read the stored counter row, if any
    pub async fn find(&self, account_token: &str, kind: &str) -> Result<Option<DailyCounter>, AnonimkaError> {
        let counter = sqlx::query_as::<_, DailyCounter>(
            "SELECT account_token, kind, count, last_reset_date FROM daily_counters \
             WHERE account_token = $1 AND kind = $2"
        )
        .bind(account_token)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }

    /// Timestamp variant of the guarded update: advance the stamp only when
    /// at least `min_interval_seconds` have passed since the previous one.
    /// Returns the seconds still remaining when the cooldown is active.
    pub async fn try_touch_stamp(
        &self,
        account_token: &str,
        kind: &str,
        now: DateTime<Utc>,
        min_interval_seconds: i64,
    ) -> Result<Option<i64>, AnonimkaError> {
        let touched: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            INSERT INTO action_stamps (account_token, kind, last_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_token, kind) DO UPDATE
            SET last_at = $3
            WHERE action_stamps.last_at <= $3 - ($4 * INTERVAL '1 second')
            RETURNING last_at
            "#
        )
        .bind(account_token)
        .bind(kind)
        .bind(now)
        .bind(min_interval_seconds)
        .fetch_optional(&self.pool)
        .await?;

        if touched.is_some() {
            return Ok(None);
        }

        let last: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT last_at FROM action_stamps WHERE account_token = $1 AND kind = $2"
        )
        .bind(account_token)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        let remaining = last
            .map(|(last_at,)| min_interval_seconds - (now - last_at).num_seconds())
            .map(|secs| secs.max(1))
            .unwrap_or(1);

        Ok(Some(remaining))
    }
}
