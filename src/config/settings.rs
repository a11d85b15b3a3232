//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub push: PushConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    pub admin_ids: Vec<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Push notification (FCM) configuration for the secondary channel
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub server_key: String,
}

/// Tier limits and quota windows
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Photos per platform day on the free tier; premium is unlimited
    pub photos_per_day_free: i32,
    /// Listings created per platform day, free tier
    pub ads_per_day_free: i32,
    /// Listings created per platform day, premium tier
    pub ads_per_day_premium: i32,
    /// Simultaneously pending chat requests per listing from free initiators
    pub pending_request_cap: i64,
    /// Rolling window between nickname changes for premium accounts
    pub nickname_cooldown_hours: i64,
    /// Minimum interval between broadcast-style messages
    pub broadcast_cooldown_seconds: i64,
    /// UTC offset of the platform-local day used for daily resets
    pub day_offset_hours: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    pub max_files: u32,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("ANONIMKA"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::AnonimkaError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                admin_ids: vec![],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/anonimka".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            push: PushConfig {
                enabled: false,
                endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
                server_key: String::new(),
            },
            limits: LimitsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/anonimka".to_string(),
                max_files: 5,
            },
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            photos_per_day_free: 1,
            ads_per_day_free: 1,
            ads_per_day_premium: 5,
            pending_request_cap: 5,
            nickname_cooldown_hours: 24,
            broadcast_cooldown_seconds: 30,
            day_offset_hours: 3,
        }
    }
}
