//! Subscription transaction repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use crate::models::subscription::SubscriptionTransaction;
use crate::utils::errors::AnonimkaError;

const TRANSACTION_COLUMNS: &str = "id, account_token, months, amount_stars, transaction_id, \
    payment_method, premium_until, created_at";

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a ledger entry. Returns None when the transaction id was
    /// already recorded; the uniqueness constraint, not an application
    /// read-then-write, is what makes replays idempotent.
    pub async fn insert_transaction(
        &self,
        conn: &mut PgConnection,
        account_token: &str,
        months: i32,
        amount_stars: i64,
        transaction_id: &str,
        payment_method: &str,
        premium_until: DateTime<Utc>,
    ) -> Result<Option<SubscriptionTransaction>, AnonimkaError> {
        let entry = sqlx::query_as::<_, SubscriptionTransaction>(&format!(
            r#"
            INSERT INTO premium_transactions
                (account_token, months, amount_stars, transaction_id, payment_method, premium_until, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (transaction_id) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(account_token)
        .bind(months)
        .bind(amount_stars)
        .bind(transaction_id)
        .bind(payment_method)
        .bind(premium_until)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Fetch the previously recorded entry for a replayed transaction id
    pub async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<SubscriptionTransaction>, AnonimkaError> {
        let entry = sqlx::query_as::<_, SubscriptionTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM premium_transactions WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// List ledger entries for one account, newest first
    pub async fn list_for_account(
        &self,
        account_token: &str,
        limit: i64,
    ) -> Result<Vec<SubscriptionTransaction>, AnonimkaError> {
        let entries = sqlx::query_as::<_, SubscriptionTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM premium_transactions \
             WHERE account_token = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(account_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Pool handle for service-level transactions
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
