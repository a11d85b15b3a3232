//! Error handling for the Anonimka core
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy. Business-rule rejections
//! (quota, admission cap, blocks) are dedicated variants carrying enough data
//! for the calling layer to render an upsell; infrastructure failures wrap
//! the underlying error.

use thiserror::Error;

/// Main error type for the Anonimka core
#[derive(Error, Debug)]
pub enum AnonimkaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Account not found: {token}")]
    AccountNotFound { token: String },

    #[error("Chat request not found: {chat_id}")]
    ChatNotFound { chat_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Photo limit reached: {used}/{limit} per day on the free tier")]
    PhotoLimitReached { used: i32, limit: i32 },

    #[error("Free accounts cannot change an existing nickname")]
    NicknameLocked,

    #[error("Nickname can be changed again in {hours_remaining} hours")]
    NicknameCooldown { hours_remaining: i64 },

    #[error("Nickname already taken: {nickname}")]
    NicknameTaken { nickname: String },

    #[error("Pending request limit reached for this listing: {pending}/{cap}")]
    AdmissionLimitReached { pending: i64, cap: i64 },

    #[error("Chat is blocked")]
    Blocked,

    #[error("Cooldown active for {kind}: {seconds_remaining}s remaining")]
    CooldownActive { kind: String, seconds_remaining: i64 },

    #[error("Account is banned: {token}")]
    Banned { token: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for Anonimka operations
pub type Result<T> = std::result::Result<T, AnonimkaError>;

impl AnonimkaError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            AnonimkaError::Database(_) => false,
            AnonimkaError::Migration(_) => false,
            AnonimkaError::Telegram(_) => true,
            AnonimkaError::Http(_) => true,
            AnonimkaError::Serialization(_) => false,
            AnonimkaError::Io(_) => true,
            AnonimkaError::Config(_) => false,
            AnonimkaError::InvalidInput(_) => false,
            AnonimkaError::AccountNotFound { .. } => false,
            AnonimkaError::ChatNotFound { .. } => false,
            AnonimkaError::InvalidStateTransition { .. } => false,
            AnonimkaError::PhotoLimitReached { .. } => true,
            AnonimkaError::NicknameLocked => false,
            AnonimkaError::NicknameCooldown { .. } => true,
            AnonimkaError::NicknameTaken { .. } => false,
            AnonimkaError::AdmissionLimitReached { .. } => true,
            AnonimkaError::Blocked => false,
            AnonimkaError::CooldownActive { .. } => true,
            AnonimkaError::Banned { .. } => false,
            AnonimkaError::ServiceUnavailable(_) => true,
        }
    }

    /// Check if the error is a business-rule rejection that should be shown
    /// to the user directly rather than surfaced as a retry-later failure
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            AnonimkaError::PhotoLimitReached { .. }
                | AnonimkaError::NicknameLocked
                | AnonimkaError::NicknameCooldown { .. }
                | AnonimkaError::NicknameTaken { .. }
                | AnonimkaError::AdmissionLimitReached { .. }
                | AnonimkaError::Blocked
                | AnonimkaError::CooldownActive { .. }
                | AnonimkaError::InvalidInput(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnonimkaError::Database(_) => ErrorSeverity::Critical,
            AnonimkaError::Migration(_) => ErrorSeverity::Critical,
            AnonimkaError::Config(_) => ErrorSeverity::Critical,
            AnonimkaError::Banned { .. } => ErrorSeverity::Warning,
            e if e.is_business_rejection() => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rejections_are_info() {
        let err = AnonimkaError::AdmissionLimitReached { pending: 5, cap: 5 };
        assert!(err.is_business_rejection());
        assert_eq!(err.severity(), ErrorSeverity::Info);

        let err = AnonimkaError::NicknameCooldown { hours_remaining: 7 };
        assert!(err.is_business_rejection());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_infrastructure_errors_are_not_rejections() {
        let err = AnonimkaError::Config("missing bot token".to_string());
        assert!(!err.is_business_rejection());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
