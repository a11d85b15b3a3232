//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod account;
pub mod chat;
pub mod counter;
pub mod referral;
pub mod subscription;

// Re-export commonly used models
pub use account::{Account, CreateAccountRequest, LegacyEntitlement};
pub use chat::{ChatRequest, Message, MessageContent};
pub use counter::{CounterKind, DailyCounter, QuotaDecision};
pub use referral::{ReferralRecord, RewardOutcome};
pub use subscription::{Entitlement, SubscriptionTransaction};
