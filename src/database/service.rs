//! Database service layer
//!
//! This module provides a high-level handle bundling all repositories

use crate::database::{
    AccountRepository, ChatRepository, CounterRepository, DatabasePool,
    ReferralRepository, SubscriptionRepository,
};
use crate::models::{Account, CreateAccountRequest};
use crate::utils::errors::AnonimkaError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub accounts: AccountRepository,
    pub chats: ChatRepository,
    pub counters: CounterRepository,
    pub referrals: ReferralRepository,
    pub subscriptions: SubscriptionRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            chats: ChatRepository::new(pool.clone()),
            counters: CounterRepository::new(pool.clone()),
            referrals: ReferralRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool),
        }
    }

    /// Initialize an account for a Telegram user, returning the existing
    /// one when the Telegram id is already linked
    pub async fn initialize_account(
        &self,
        telegram_id: i64,
        display_nickname: Option<String>,
    ) -> Result<Account, AnonimkaError> {
        if let Some(existing) = self.accounts.find_by_telegram_id(telegram_id).await? {
            return Ok(existing);
        }

        let request = CreateAccountRequest {
            telegram_id: Some(telegram_id),
            display_nickname,
        };

        self.accounts.create(request).await
    }
}
