//! Anonimka entitlement and interaction-admission core
//!
//! Backend core for an anonymous dating mini app on Telegram. This library
//! provides subscription entitlements with calendar-month stacking, tiered
//! daily quotas, chat-request admission control, idempotent referral
//! rewards and a fallback notification chain.

pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{AnonimkaError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
