//! Quota enforcer implementation
//!
//! Tier-aware daily limits over the guarded counter updates, the nickname
//! change policy, and the timestamp-cooldown variant used for broadcast
//! throttling.

use std::sync::OnceLock;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info};
use crate::config::LimitsConfig;
use crate::database::repositories::{AccountRepository, CounterRepository};
use crate::models::account::Account;
use crate::models::counter::{CounterKind, QuotaDecision};
use crate::services::entitlement::EntitlementService;
use crate::utils::clock::PlatformClock;
use crate::utils::errors::{AnonimkaError, Result};
use crate::utils::logging::log_quota_decision;

/// Daily limit for a counter kind at the given tier; None is unlimited
pub fn daily_limit(limits: &LimitsConfig, kind: CounterKind, premium: bool) -> Option<i32> {
    match (kind, premium) {
        (CounterKind::PhotosSent, true) => None,
        (CounterKind::PhotosSent, false) => Some(limits.photos_per_day_free),
        (CounterKind::AdsCreated, true) => Some(limits.ads_per_day_premium),
        (CounterKind::AdsCreated, false) => Some(limits.ads_per_day_free),
    }
}

/// Nickname change decision for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicknameDecision {
    /// Change permitted; `first_assignment` assignments never stamp the
    /// change timestamp, so they do not consume the quota
    Allowed { first_assignment: bool },
    /// Free tier cannot change away from an existing nickname
    LockedFree,
    /// Premium rolling window has not elapsed yet
    Cooldown { hours_remaining: i64 },
}

/// Decide whether a nickname change is allowed.
///
/// The first-ever assignment (account has no nonempty nickname) is free for
/// every tier. After that, free accounts are locked and premium accounts
/// get one change per rolling window measured from `changed_at`.
pub fn nickname_change_allowed(
    premium: bool,
    has_nickname: bool,
    changed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_hours: i64,
) -> NicknameDecision {
    if !has_nickname {
        return NicknameDecision::Allowed { first_assignment: true };
    }

    if !premium {
        return NicknameDecision::LockedFree;
    }

    match changed_at {
        Some(last) => {
            let elapsed_hours = (now - last).num_hours();
            if elapsed_hours < cooldown_hours {
                let remaining_minutes = cooldown_hours * 60 - (now - last).num_minutes();
                NicknameDecision::Cooldown {
                    hours_remaining: (remaining_minutes + 59) / 60,
                }
            } else {
                NicknameDecision::Allowed { first_assignment: false }
            }
        }
        None => NicknameDecision::Allowed { first_assignment: false },
    }
}

fn nickname_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Zа-яА-ЯёЁ0-9_-]+$").expect("nickname pattern is valid")
    })
}

/// Validate nickname charset: letters (Latin/Cyrillic), digits, underscore, dash
pub fn validate_nickname(nickname: &str) -> Result<()> {
    if nickname.is_empty() || nickname.len() > 64 {
        return Err(AnonimkaError::InvalidInput(
            "Nickname must be between 1 and 64 characters".to_string(),
        ));
    }
    if !nickname_pattern().is_match(nickname) {
        return Err(AnonimkaError::InvalidInput(
            "Nickname can only contain letters, numbers, underscore and dash".to_string(),
        ));
    }
    Ok(())
}

/// Quota enforcer service
#[derive(Clone)]
pub struct QuotaService {
    accounts: AccountRepository,
    counters: CounterRepository,
    entitlement: EntitlementService,
    limits: LimitsConfig,
    clock: PlatformClock,
}

impl QuotaService {
    pub fn new(
        accounts: AccountRepository,
        counters: CounterRepository,
        entitlement: EntitlementService,
        limits: LimitsConfig,
        clock: PlatformClock,
    ) -> Self {
        Self { accounts, counters, entitlement, limits, clock }
    }

    /// Try to consume one slot of a rate-limited action for today.
    /// Never mutates storage when the limit is already reached.
    pub async fn try_consume(&self, account: &Account, kind: CounterKind) -> Result<QuotaDecision> {
        let premium = self.entitlement.is_effectively_premium(account).await?;
        let limit = daily_limit(&self.limits, kind, premium);
        let today = self.clock.today();

        let decision = match limit {
            None => {
                // Unlimited tier still tracks usage
                let used = self
                    .counters
                    .increment(&account.token, kind.as_str(), today)
                    .await?;
                QuotaDecision { allowed: true, used, limit: None, remaining: None }
            }
            Some(limit) if limit <= 0 => {
                QuotaDecision { allowed: false, used: 0, limit: Some(limit), remaining: Some(0) }
            }
            Some(limit) => {
                match self
                    .counters
                    .try_increment(&account.token, kind.as_str(), today, limit)
                    .await?
                {
                    Some(used) => QuotaDecision {
                        allowed: true,
                        used,
                        limit: Some(limit),
                        remaining: Some((limit - used).max(0)),
                    },
                    None => {
                        let used = self
                            .counters
                            .find(&account.token, kind.as_str())
                            .await?
                            .map(|c| c.logical_count(today))
                            .unwrap_or(0);
                        QuotaDecision { allowed: false, used, limit: Some(limit), remaining: Some(0) }
                    }
                }
            }
        };

        log_quota_decision(&account.token, kind.as_str(), decision.allowed, decision.used);
        Ok(decision)
    }

    /// Consume a photo slot, translating exhaustion into the dedicated
    /// photo-limit error so callers can upsell premium
    pub async fn consume_photo_slot(&self, account: &Account) -> Result<()> {
        let decision = self.try_consume(account, CounterKind::PhotosSent).await?;
        if !decision.allowed {
            return Err(AnonimkaError::PhotoLimitReached {
                used: decision.used,
                limit: decision.limit.unwrap_or(0),
            });
        }
        Ok(())
    }

    /// Change or assign the display nickname, applying the tier policy
    pub async fn change_nickname(&self, account: &Account, nickname: &str) -> Result<Account> {
        validate_nickname(nickname)?;

        let premium = self.entitlement.is_effectively_premium(account).await?;
        let now = self.clock.now();
        let decision = nickname_change_allowed(
            premium,
            account.has_nickname(),
            account.nickname_changed_at,
            now,
            self.limits.nickname_cooldown_hours,
        );

        let first_assignment = match decision {
            NicknameDecision::Allowed { first_assignment } => first_assignment,
            NicknameDecision::LockedFree => return Err(AnonimkaError::NicknameLocked),
            NicknameDecision::Cooldown { hours_remaining } => {
                return Err(AnonimkaError::NicknameCooldown { hours_remaining })
            }
        };

        if self.accounts.nickname_taken(nickname, &account.token).await? {
            return Err(AnonimkaError::NicknameTaken { nickname: nickname.to_string() });
        }

        let updated = self
            .accounts
            .set_nickname(&account.token, nickname, !first_assignment)
            .await?;

        info!(
            account = %account.token,
            first_assignment = first_assignment,
            "Nickname updated"
        );
        Ok(updated)
    }

    /// Broadcast-style cooldown: a timestamp variant of the guarded counter
    /// update. Succeeds at most once per configured interval.
    pub async fn try_touch_broadcast(&self, account: &Account) -> Result<()> {
        let now = self.clock.now();
        match self
            .counters
            .try_touch_stamp(
                &account.token,
                "broadcast",
                now,
                self.limits.broadcast_cooldown_seconds,
            )
            .await?
        {
            None => {
                debug!(account = %account.token, "Broadcast cooldown passed");
                Ok(())
            }
            Some(seconds_remaining) => Err(AnonimkaError::CooldownActive {
                kind: "broadcast".to_string(),
                seconds_remaining,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn limits() -> LimitsConfig {
        LimitsConfig::default()
    }

    #[test]
    fn test_photo_limits_by_tier() {
        assert_eq!(daily_limit(&limits(), CounterKind::PhotosSent, false), Some(1));
        assert_eq!(daily_limit(&limits(), CounterKind::PhotosSent, true), None);
    }

    #[test]
    fn test_ad_limits_by_tier() {
        assert_eq!(daily_limit(&limits(), CounterKind::AdsCreated, false), Some(1));
        assert_eq!(daily_limit(&limits(), CounterKind::AdsCreated, true), Some(5));
    }

    #[test]
    fn test_first_assignment_allowed_for_any_tier() {
        let now = Utc::now();
        assert_eq!(
            nickname_change_allowed(false, false, None, now, 24),
            NicknameDecision::Allowed { first_assignment: true }
        );
        assert_eq!(
            nickname_change_allowed(true, false, None, now, 24),
            NicknameDecision::Allowed { first_assignment: true }
        );
    }

    #[test]
    fn test_free_tier_locked_after_assignment() {
        let now = Utc::now();
        assert_eq!(
            nickname_change_allowed(false, true, None, now, 24),
            NicknameDecision::LockedFree
        );
        assert_eq!(
            nickname_change_allowed(false, true, Some(now - Duration::days(400)), now, 24),
            NicknameDecision::LockedFree
        );
    }

    #[test]
    fn test_premium_cooldown_window() {
        let now = Utc::now();
        let recent = now - Duration::hours(10);
        match nickname_change_allowed(true, true, Some(recent), now, 24) {
            NicknameDecision::Cooldown { hours_remaining } => assert_eq!(hours_remaining, 14),
            other => panic!("expected cooldown, got {other:?}"),
        }

        let old = now - Duration::hours(25);
        assert_eq!(
            nickname_change_allowed(true, true, Some(old), now, 24),
            NicknameDecision::Allowed { first_assignment: false }
        );
    }

    #[test]
    fn test_premium_without_stamp_can_change() {
        let now = Utc::now();
        assert_eq!(
            nickname_change_allowed(true, true, None, now, 24),
            NicknameDecision::Allowed { first_assignment: false }
        );
    }

    #[test]
    fn test_cooldown_rounds_hours_up() {
        let now = Utc::now();
        let recent = now - Duration::minutes(30);
        match nickname_change_allowed(true, true, Some(recent), now, 24) {
            NicknameDecision::Cooldown { hours_remaining } => assert_eq!(hours_remaining, 24),
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn test_nickname_validation() {
        assert!(validate_nickname("valid_nick-1").is_ok());
        assert!(validate_nickname("Ника").is_ok());
        assert!(validate_nickname("has space").is_err());
        assert!(validate_nickname("emoji😀").is_err());
        assert!(validate_nickname("").is_err());
    }
}
