//! Services module
//!
//! This module contains the business logic services

pub mod chat;
pub mod entitlement;
pub mod ledger;
pub mod notification;
pub mod quota;
pub mod referral;

// Re-export commonly used services
pub use chat::ChatService;
pub use entitlement::EntitlementService;
pub use ledger::SubscriptionService;
pub use notification::{DeliveryChannel, NotificationPayload, NotificationService};
pub use quota::{NicknameDecision, QuotaService};
pub use referral::ReferralService;

use teloxide::Bot;
use crate::config::settings::Settings;
use crate::database::service::DatabaseService;
use crate::utils::clock::PlatformClock;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub entitlement_service: EntitlementService,
    pub subscription_service: SubscriptionService,
    pub quota_service: QuotaService,
    pub chat_service: ChatService,
    pub referral_service: ReferralService,
    pub notification_service: NotificationService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(bot: Bot, settings: Settings, db: DatabaseService) -> Result<Self> {
        let clock = PlatformClock::new(settings.limits.day_offset_hours);

        let entitlement_service = EntitlementService::new(db.accounts.clone(), clock.clone());
        let subscription_service = SubscriptionService::new(
            db.accounts.clone(),
            db.subscriptions.clone(),
            clock.clone(),
        );
        let quota_service = QuotaService::new(
            db.accounts.clone(),
            db.counters.clone(),
            entitlement_service.clone(),
            settings.limits.clone(),
            clock,
        );
        let notification_service =
            NotificationService::new(bot, db.accounts.clone(), settings.push.clone());
        let chat_service = ChatService::new(
            db.chats.clone(),
            db.accounts.clone(),
            entitlement_service.clone(),
            quota_service.clone(),
            notification_service.clone(),
            settings.limits.pending_request_cap,
        );
        let referral_service =
            ReferralService::new(db.referrals.clone(), subscription_service.clone());

        Ok(Self {
            entitlement_service,
            subscription_service,
            quota_service,
            chat_service,
            referral_service,
            notification_service,
        })
    }
}
