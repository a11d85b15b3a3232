//! Entitlement resolver implementation
//!
//! Effective premium is always computed from the flag and the expiry, never
//! read as a stored boolean alone: an account can legitimately carry
//! `is_premium = true` with an expiry in the past.
//!
//! Two entitlement ledgers exist for historical reasons (token-only web
//! onboarding vs Telegram onboarding). Until the legacy rows are migrated,
//! the resolver reads both and prefers whichever shows an active premium
//! state.

use chrono::{DateTime, Utc};
use tracing::debug;
use crate::database::repositories::AccountRepository;
use crate::models::{Account, Entitlement};
use crate::utils::clock::PlatformClock;
use crate::utils::errors::{AnonimkaError, Result};

/// Compute effective premium from the stored flag and expiry
pub fn effective_premium(flag: bool, until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    flag && until.map_or(true, |u| u > now)
}

/// Entitlement resolver
#[derive(Clone)]
pub struct EntitlementService {
    accounts: AccountRepository,
    clock: PlatformClock,
}

impl EntitlementService {
    pub fn new(accounts: AccountRepository, clock: PlatformClock) -> Self {
        Self { accounts, clock }
    }

    /// Resolve the current tier of an account by token.
    ///
    /// A token may predate the accounts row entirely: the old web onboarding
    /// wrote grants into the token-keyed ledger before an account existed.
    /// Such a token still resolves as premium while its grant is active.
    pub async fn resolve(&self, token: &str) -> Result<Entitlement> {
        if let Some(account) = self.accounts.find_by_token(token).await? {
            return self.resolve_for(&account).await;
        }

        if let Some(legacy) = self.accounts.find_legacy_entitlement(token).await? {
            if effective_premium(legacy.is_premium, legacy.premium_until, self.clock.now()) {
                debug!(token = token, "Pre-registration token resolved from legacy ledger");
                return Ok(Entitlement { premium: true, until: legacy.premium_until });
            }
        }

        Err(AnonimkaError::AccountNotFound { token: token.to_string() })
    }

    /// Resolve the tier of an already loaded account
    pub async fn resolve_for(&self, account: &Account) -> Result<Entitlement> {
        let now = self.clock.now();
        let primary_active = effective_premium(account.is_premium, account.premium_until, now);

        if primary_active {
            return Ok(Entitlement { premium: true, until: account.premium_until });
        }

        // Legacy token-keyed ledger may hold an active grant the accounts
        // row never received
        if let Some(legacy) = self.accounts.find_legacy_entitlement(&account.token).await? {
            if effective_premium(legacy.is_premium, legacy.premium_until, now) {
                debug!(account = %account.token, "Entitlement resolved from legacy token ledger");
                return Ok(Entitlement { premium: true, until: legacy.premium_until });
            }
        }

        Ok(Entitlement { premium: false, until: account.premium_until })
    }

    /// Shorthand for callers that only need the boolean
    pub async fn is_effectively_premium(&self, account: &Account) -> Result<bool> {
        Ok(self.resolve_for(account).await?.premium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_flag_alone_is_not_premium() {
        let now = Utc::now();
        let expired = now - Duration::hours(1);
        assert!(!effective_premium(true, Some(expired), now));
    }

    #[test]
    fn test_future_expiry_is_premium() {
        let now = Utc::now();
        let future = now + Duration::days(30);
        assert!(effective_premium(true, Some(future), now));
    }

    #[test]
    fn test_null_expiry_with_flag_is_premium() {
        let now = Utc::now();
        assert!(effective_premium(true, None, now));
    }

    #[test]
    fn test_unset_flag_is_never_premium() {
        let now = Utc::now();
        let future = now + Duration::days(30);
        assert!(!effective_premium(false, Some(future), now));
        assert!(!effective_premium(false, None, now));
    }

    #[test]
    fn test_expiry_exactly_now_is_expired() {
        let now = Utc::now();
        assert!(!effective_premium(true, Some(now), now));
    }
}
