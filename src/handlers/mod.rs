//! Bot handlers module
//!
//! This module contains the Telegram bot handlers:
//! - Command handlers for bot commands
//! - Payment handlers for the Stars purchase flow

pub mod commands;
pub mod payments;

pub use commands::{handle_help, handle_premium, handle_start, handle_status};
pub use payments::{handle_pre_checkout, handle_successful_payment};

/// Common result type used by all handlers
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
