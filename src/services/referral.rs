//! Referral reward issuer implementation
//!
//! Converts a qualifying referral into exactly one subscription credit for
//! the referrer. The `reward_given` false -> true transition is the lock:
//! it runs in the same transaction as the ledger credit, so a failed credit
//! rolls the flip back and the reward stays claimable on retry.

use tracing::{info, warn};
use crate::database::repositories::ReferralRepository;
use crate::models::referral::RewardOutcome;
use crate::services::ledger::SubscriptionService;
use crate::utils::errors::{AnonimkaError, Result};

/// Months of premium credited to the referrer per qualified referral
pub const REWARD_MONTHS: i32 = 1;

/// Referral reward issuer
#[derive(Clone)]
pub struct ReferralService {
    referrals: ReferralRepository,
    ledger: SubscriptionService,
}

impl ReferralService {
    pub fn new(referrals: ReferralRepository, ledger: SubscriptionService) -> Self {
        Self { referrals, ledger }
    }

    /// Register that `referred` arrived through `referrer`'s link.
    /// Self-referrals are rejected up front; repeated registrations for the
    /// same referred account are benign no-ops.
    pub async fn register(&self, referrer_token: &str, referred_token: &str) -> Result<()> {
        if referrer_token == referred_token {
            return Err(AnonimkaError::InvalidInput(
                "Cannot refer yourself".to_string(),
            ));
        }
        if referrer_token.is_empty() || referred_token.is_empty() {
            return Err(AnonimkaError::InvalidInput(
                "Referrer and referred tokens are required".to_string(),
            ));
        }

        match self.referrals.create(referrer_token, referred_token).await? {
            Some(record) => {
                info!(
                    referral_id = record.id,
                    referrer = referrer_token,
                    "Referral registered"
                );
            }
            None => {
                info!(referred = referred_token, "Referral already registered, ignoring");
            }
        }
        Ok(())
    }

    /// Claim the reward for a referred account that has qualified (created
    /// its first listing). Safe to call repeatedly and concurrently.
    pub async fn claim(&self, referred_token: &str) -> Result<RewardOutcome> {
        let Some(record) = self.referrals.find_by_referred(referred_token).await? else {
            // Not an error: the account simply did not come via a referral
            return Ok(RewardOutcome::NoReferral);
        };

        if record.is_self_referral() {
            // Resolve the record so it is never retried, but pay nothing
            let mut tx = self.referrals.pool().begin().await?;
            self.referrals.try_mark_rewarded(&mut tx, record.id).await?;
            tx.commit().await?;
            warn!(referral_id = record.id, "Self-referral resolved without reward");
            return Ok(RewardOutcome::SelfReferral);
        }

        if record.reward_given {
            return Ok(RewardOutcome::AlreadyGranted);
        }

        let mut tx = self.referrals.pool().begin().await?;

        // The conditional flip is the lock: a concurrent claim that lost
        // the race observes zero affected rows
        let flipped = self.referrals.try_mark_rewarded(&mut tx, record.id).await?;
        if !flipped {
            tx.rollback().await?;
            return Ok(RewardOutcome::AlreadyGranted);
        }

        // Ledger failure propagates and rolls the flip back with the
        // transaction, keeping the reward claimable
        let premium_until = self
            .ledger
            .extend_in(
                &mut tx,
                &record.referrer_token,
                REWARD_MONTHS,
                &record.reward_transaction_id(),
                0,
                "referral",
            )
            .await?;

        tx.commit().await?;

        info!(
            referral_id = record.id,
            referrer = %record.referrer_token,
            premium_until = %premium_until,
            "Referral reward credited"
        );
        Ok(RewardOutcome::Granted { premium_until })
    }

    /// Referral statistics for one referrer: (total, rewarded)
    pub async fn stats(&self, referrer_token: &str) -> Result<(i64, i64)> {
        self.referrals.stats_for_referrer(referrer_token).await
    }
}
