//! Account repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::models::account::{Account, CreateAccountRequest, LegacyEntitlement};
use crate::utils::errors::AnonimkaError;

const ACCOUNT_COLUMNS: &str = "token, telegram_id, display_nickname, nickname_changed_at, \
    is_premium, premium_until, is_banned, bot_blocked, device_token, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new account with a freshly generated opaque token
    pub async fn create(&self, request: CreateAccountRequest) -> Result<Account, AnonimkaError> {
        let token = Uuid::new_v4().simple().to_string();
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (token, telegram_id, display_nickname, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&token)
        .bind(request.telegram_id)
        .bind(request.display_nickname)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find account by its opaque token
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Account>, AnonimkaError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find account by linked Telegram ID
    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<Account>, AnonimkaError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE telegram_id = $1"
        ))
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Load the account row inside a transaction, locking it for update
    pub async fn find_by_token_for_update(
        &self,
        conn: &mut PgConnection,
        token: &str,
    ) -> Result<Option<Account>, AnonimkaError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(account)
    }

    /// Read the legacy token-keyed entitlement row, if any
    pub async fn find_legacy_entitlement(&self, token: &str) -> Result<Option<LegacyEntitlement>, AnonimkaError> {
        let row = sqlx::query_as::<_, LegacyEntitlement>(
            "SELECT token, is_premium, premium_until FROM premium_tokens WHERE token = $1"
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Persist a new premium expiry (ledger write, runs inside the ledger transaction)
    pub async fn set_premium(
        &self,
        conn: &mut PgConnection,
        token: &str,
        premium_until: DateTime<Utc>,
    ) -> Result<(), AnonimkaError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET is_premium = TRUE, premium_until = $2, updated_at = $3
            WHERE token = $1
            "#
        )
        .bind(token)
        .bind(premium_until)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Set the display nickname, optionally stamping the change timestamp.
    /// First-ever assignments do not stamp it so they never count against
    /// the change quota.
    pub async fn set_nickname(
        &self,
        token: &str,
        nickname: &str,
        stamp_changed_at: bool,
    ) -> Result<Account, AnonimkaError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET display_nickname = $2,
                nickname_changed_at = CASE WHEN $3 THEN $4 ELSE nickname_changed_at END,
                updated_at = $4
            WHERE token = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(nickname)
        .bind(stamp_changed_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    /// Case-insensitive nickname availability check, excluding the account itself
    pub async fn nickname_taken(&self, nickname: &str, exclude_token: &str) -> Result<bool, AnonimkaError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT token FROM accounts WHERE LOWER(display_nickname) = LOWER($1) AND token != $2 LIMIT 1"
        )
        .bind(nickname)
        .bind(exclude_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Ban/unban account (soft flag, accounts are never hard-deleted)
    pub async fn set_ban_status(&self, token: &str, is_banned: bool) -> Result<Account, AnonimkaError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET is_banned = $2, updated_at = $3
            WHERE token = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(is_banned)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    /// Remember that the delivery bot is blocked by this account's Telegram user
    pub async fn mark_bot_blocked(&self, token: &str) -> Result<(), AnonimkaError> {
        sqlx::query("UPDATE accounts SET bot_blocked = TRUE, updated_at = $2 WHERE token = $1")
            .bind(token)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register or replace the push device token
    pub async fn set_device_token(&self, token: &str, device_token: Option<&str>) -> Result<(), AnonimkaError> {
        sqlx::query("UPDATE accounts SET device_token = $2, updated_at = $3 WHERE token = $1")
            .bind(token)
            .bind(device_token)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_account_repository_creation() {
        // Requires a live database; only exercised when one is reachable
        let pool = PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let repo = AccountRepository::new(pool);
            assert!(!repo.pool.is_closed());
        }
    }
}
