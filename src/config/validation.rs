//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{AnonimkaError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_push_config(&settings.push)?;
    validate_limits_config(&settings.limits)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(AnonimkaError::Config(
            "Bot token is required".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AnonimkaError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(AnonimkaError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(AnonimkaError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate push configuration
fn validate_push_config(config: &super::PushConfig) -> Result<()> {
    if config.enabled && config.server_key.is_empty() {
        return Err(AnonimkaError::Config(
            "Push server key is required when push is enabled".to_string()
        ));
    }

    if config.enabled && config.endpoint.is_empty() {
        return Err(AnonimkaError::Config(
            "Push endpoint is required when push is enabled".to_string()
        ));
    }

    Ok(())
}

/// Validate tier limits
fn validate_limits_config(config: &super::LimitsConfig) -> Result<()> {
    if config.photos_per_day_free < 0 || config.ads_per_day_free < 0 || config.ads_per_day_premium < 0 {
        return Err(AnonimkaError::Config(
            "Daily limits cannot be negative".to_string()
        ));
    }

    if config.pending_request_cap < 1 {
        return Err(AnonimkaError::Config(
            "Pending request cap must be at least 1".to_string()
        ));
    }

    if config.nickname_cooldown_hours < 1 {
        return Err(AnonimkaError::Config(
            "Nickname cooldown must be at least 1 hour".to_string()
        ));
    }

    if !(-12..=14).contains(&config.day_offset_hours) {
        return Err(AnonimkaError::Config(
            "Day offset must be a valid UTC offset".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(AnonimkaError::Config(
            "Logging level is required".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_fail_without_token() {
        let settings = Settings::default();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_settings_with_token_validate() {
        let mut settings = Settings::default();
        settings.bot.token = "123:abc".to_string();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_push_requires_key_when_enabled() {
        let mut settings = Settings::default();
        settings.bot.token = "123:abc".to_string();
        settings.push.enabled = true;
        assert!(validate_settings(&settings).is_err());
    }
}
