//! Repository implementations for database operations

pub mod account;
pub mod chat;
pub mod counter;
pub mod referral;
pub mod subscription;

pub use account::AccountRepository;
pub use chat::ChatRepository;
pub use counter::CounterRepository;
pub use referral::ReferralRepository;
pub use subscription::SubscriptionRepository;
