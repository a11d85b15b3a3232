//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging helpers
//! for the Anonimka core.

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must be kept
/// alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "anonimka.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log account actions with structured data
pub fn log_account_action(token: &str, action: &str, details: Option<&str>) {
    info!(
        account = token,
        action = action,
        details = details,
        "Account action performed"
    );
}

/// Log quota decisions
pub fn log_quota_decision(token: &str, kind: &str, allowed: bool, used: i32) {
    if allowed {
        info!(account = token, kind = kind, used = used, "Quota consumed");
    } else {
        warn!(account = token, kind = kind, used = used, "Quota exhausted");
    }
}

/// Log subscription ledger writes
pub fn log_subscription_event(token: &str, transaction_id: &str, months: i32, replayed: bool) {
    info!(
        account = token,
        transaction_id = transaction_id,
        months = months,
        replayed = replayed,
        "Subscription ledger event"
    );
}

/// Log notification delivery outcomes
pub fn log_delivery(token: &str, channel: &str, detail: Option<&str>) {
    info!(
        account = token,
        channel = channel,
        detail = detail,
        "Notification delivery attempted"
    );
}
