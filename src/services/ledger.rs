//! Subscription ledger implementation
//!
//! Applies purchases and reward credits to an account's premium expiry with
//! stacking: an active subscription extends from its current expiry, an
//! expired or absent one from now. Calendar-month arithmetic preserves the
//! day-of-month where the target month allows it.

use chrono::{DateTime, Months, Utc};
use sqlx::PgConnection;
use tracing::{info, warn};
use crate::database::repositories::{AccountRepository, SubscriptionRepository};
use crate::services::entitlement::effective_premium;
use crate::utils::clock::PlatformClock;
use crate::utils::errors::{AnonimkaError, Result};
use crate::utils::logging::log_subscription_event;

pub const MIN_MONTHS: i32 = 1;
pub const MAX_MONTHS: i32 = 12;

/// Compute the new expiry for an extension of `months` calendar months.
/// `current` and `active` describe the account's present entitlement.
pub fn stacked_expiry(
    now: DateTime<Utc>,
    current: Option<DateTime<Utc>>,
    active: bool,
    months: i32,
) -> Result<DateTime<Utc>> {
    if !(MIN_MONTHS..=MAX_MONTHS).contains(&months) {
        return Err(AnonimkaError::InvalidInput(format!(
            "months must be between {MIN_MONTHS} and {MAX_MONTHS}, got {months}"
        )));
    }

    let base = match current {
        Some(until) if active => until,
        _ => now,
    };

    base.checked_add_months(Months::new(months as u32))
        .ok_or_else(|| AnonimkaError::InvalidInput("expiry out of range".to_string()))
}

/// Subscription ledger service
#[derive(Clone)]
pub struct SubscriptionService {
    accounts: AccountRepository,
    subscriptions: SubscriptionRepository,
    clock: PlatformClock,
}

impl SubscriptionService {
    pub fn new(
        accounts: AccountRepository,
        subscriptions: SubscriptionRepository,
        clock: PlatformClock,
    ) -> Self {
        Self { accounts, subscriptions, clock }
    }

    /// Apply a completed external purchase to an account.
    ///
    /// Replays of the same `transaction_id` are resolved by the storage
    /// uniqueness constraint and return the originally granted expiry
    /// without touching the account again.
    pub async fn activate(
        &self,
        account_token: &str,
        months: i32,
        transaction_id: &str,
        amount_stars: i64,
    ) -> Result<DateTime<Utc>> {
        let mut tx = self.subscriptions.pool().begin().await?;
        let new_until = self
            .extend_in(&mut tx, account_token, months, transaction_id, amount_stars, "stars")
            .await?;
        tx.commit().await?;

        Ok(new_until)
    }

    /// Core extension step, running on the caller's transaction so callers
    /// (purchase activation, referral rewards) control atomicity.
    pub async fn extend_in(
        &self,
        conn: &mut PgConnection,
        account_token: &str,
        months: i32,
        transaction_id: &str,
        amount_stars: i64,
        payment_method: &str,
    ) -> Result<DateTime<Utc>> {
        if !(MIN_MONTHS..=MAX_MONTHS).contains(&months) {
            return Err(AnonimkaError::InvalidInput(format!(
                "months must be between {MIN_MONTHS} and {MAX_MONTHS}, got {months}"
            )));
        }

        let account = self
            .accounts
            .find_by_token_for_update(conn, account_token)
            .await?
            .ok_or_else(|| AnonimkaError::AccountNotFound { token: account_token.to_string() })?;

        let now = self.clock.now();
        let active = effective_premium(account.is_premium, account.premium_until, now);
        let new_until = stacked_expiry(now, account.premium_until, active, months)?;

        let inserted = self
            .subscriptions
            .insert_transaction(
                conn,
                account_token,
                months,
                amount_stars,
                transaction_id,
                payment_method,
                new_until,
            )
            .await?;

        let Some(entry) = inserted else {
            // Replayed purchase callback: return the expiry granted the
            // first time, leave the account untouched
            let prior = self
                .subscriptions
                .find_by_transaction_id(transaction_id)
                .await?
                .ok_or_else(|| {
                    AnonimkaError::ServiceUnavailable(
                        "transaction record vanished during replay".to_string(),
                    )
                })?;
            warn!(
                account = account_token,
                transaction_id = transaction_id,
                "Duplicate transaction id, returning prior expiry"
            );
            log_subscription_event(account_token, transaction_id, months, true);
            return Ok(prior.premium_until);
        };

        // Hand the stored timestamp back, not the computed one: storage
        // precision is what a replay of this transaction id will see
        self.accounts.set_premium(conn, account_token, entry.premium_until).await?;

        info!(
            account = account_token,
            transaction_id = transaction_id,
            months = months,
            stacked = active,
            premium_until = %entry.premium_until,
            "Subscription extended"
        );
        log_subscription_event(account_token, transaction_id, months, false);

        Ok(entry.premium_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_stacking_extends_active_expiry() {
        let now = at(2024, 6, 1);
        let current = at(2024, 7, 15);
        let new = stacked_expiry(now, Some(current), true, 1).unwrap();
        assert_eq!(new, at(2024, 8, 15));
    }

    #[test]
    fn test_expired_subscription_restarts_from_now() {
        let now = at(2024, 6, 1);
        let expired = at(2024, 5, 1);
        let new = stacked_expiry(now, Some(expired), false, 1).unwrap();
        assert_eq!(new, at(2024, 7, 1));
    }

    #[test]
    fn test_never_premium_starts_from_now() {
        let now = at(2024, 6, 1);
        let new = stacked_expiry(now, None, false, 3).unwrap();
        assert_eq!(new, at(2024, 9, 1));
    }

    #[test]
    fn test_calendar_month_clamps_day_of_month() {
        // Jan 31 + 1 month lands on Feb 29 in a leap year
        let now = at(2024, 1, 31);
        let new = stacked_expiry(now, None, false, 1).unwrap();
        assert_eq!(new, at(2024, 2, 29));
    }

    #[test]
    fn test_months_out_of_range_rejected() {
        let now = at(2024, 6, 1);
        assert_matches!(
            stacked_expiry(now, None, false, 0),
            Err(AnonimkaError::InvalidInput(_))
        );
        assert_matches!(
            stacked_expiry(now, None, false, 13),
            Err(AnonimkaError::InvalidInput(_))
        );
        assert!(stacked_expiry(now, None, false, 12).is_ok());
    }

    #[test]
    fn test_double_extension_equals_sum() {
        let now = at(2024, 6, 1);
        let first = stacked_expiry(now, None, false, 1).unwrap();
        let second = stacked_expiry(now, Some(first), true, 1).unwrap();
        let direct = stacked_expiry(now, None, false, 2).unwrap();
        assert_eq!(second, direct);
    }
}
