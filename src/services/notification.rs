//! Notification dispatcher implementation
//!
//! Attempts delivery over the primary channel (Telegram direct message) and
//! falls back to push when the primary is unavailable. Delivery failures
//! are never escalated to the triggering action: a chat request or message
//! must not fail merely because its notification could not be delivered.
//! There are no retries; a transient failure is swallowed.

use serde_json::json;
use teloxide::{prelude::*, types::ChatId, ApiError, RequestError};
use tracing::{debug, warn};
use crate::config::PushConfig;
use crate::database::repositories::AccountRepository;
use crate::models::account::Account;
use crate::utils::logging::log_delivery;

/// Channel that actually carried the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Primary,
    Secondary,
    None,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Primary => "primary",
            DeliveryChannel::Secondary => "secondary",
            DeliveryChannel::None => "none",
        }
    }
}

/// Notification content
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub chat_id: Option<i64>,
}

impl NotificationPayload {
    pub fn chat_request(chat_id: i64, listing_id: Option<i64>) -> Self {
        let body = match listing_id {
            Some(listing) => format!("Someone wants to chat about your listing #{listing}"),
            None => "Someone wants to chat with you".to_string(),
        };
        Self {
            title: "New chat request".to_string(),
            body,
            chat_id: Some(chat_id),
        }
    }

    pub fn new_message(chat_id: i64, with_photo: bool) -> Self {
        let body = if with_photo {
            "You received a new photo".to_string()
        } else {
            "You received a new message".to_string()
        };
        Self {
            title: "New message".to_string(),
            body,
            chat_id: Some(chat_id),
        }
    }
}

/// Which transport a delivery attempt should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryRoute {
    Telegram(i64),
    Push,
    Nowhere,
}

/// Pick the transport: Telegram when the account is linked and has not
/// blocked the bot, otherwise push when a device token exists.
pub fn delivery_route(
    telegram_id: Option<i64>,
    bot_blocked: bool,
    has_device_token: bool,
) -> DeliveryRoute {
    match telegram_id {
        Some(id) if !bot_blocked => DeliveryRoute::Telegram(id),
        _ if has_device_token => DeliveryRoute::Push,
        _ => DeliveryRoute::Nowhere,
    }
}

/// A Telegram error that will never succeed for this recipient
fn is_permanent_telegram_error(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(
            ApiError::BotBlocked
                | ApiError::UserDeactivated
                | ApiError::ChatNotFound
                | ApiError::UserNotFound
        )
    )
}

/// Notification dispatcher
#[derive(Clone)]
pub struct NotificationService {
    bot: Bot,
    http: reqwest::Client,
    accounts: AccountRepository,
    push: PushConfig,
}

impl NotificationService {
    pub fn new(bot: Bot, accounts: AccountRepository, push: PushConfig) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
            accounts,
            push,
        }
    }

    /// Deliver a notification, falling back through channels. Never fails:
    /// the worst outcome is `DeliveryChannel::None`.
    pub async fn notify(&self, recipient: &Account, payload: NotificationPayload) -> DeliveryChannel {
        let route = delivery_route(
            recipient.telegram_id,
            recipient.bot_blocked,
            recipient.device_token.is_some(),
        );

        let channel = match route {
            DeliveryRoute::Telegram(telegram_id) => {
                self.send_telegram(recipient, telegram_id, &payload).await
            }
            DeliveryRoute::Push => self.send_push(recipient, &payload).await,
            DeliveryRoute::Nowhere => {
                debug!(account = %recipient.token, "No delivery channel available");
                DeliveryChannel::None
            }
        };

        log_delivery(&recipient.token, channel.as_str(), None);
        channel
    }

    async fn send_telegram(
        &self,
        recipient: &Account,
        telegram_id: i64,
        payload: &NotificationPayload,
    ) -> DeliveryChannel {
        let text = format!("{}\n\n{}", payload.title, payload.body);
        match self.bot.send_message(ChatId(telegram_id), text).await {
            Ok(_) => DeliveryChannel::Primary,
            Err(e) if is_permanent_telegram_error(&e) => {
                warn!(
                    account = %recipient.token,
                    error = %e,
                    "Permanent Telegram delivery failure, flagging bot as blocked"
                );
                if let Err(db_err) = self.accounts.mark_bot_blocked(&recipient.token).await {
                    warn!(account = %recipient.token, error = %db_err, "Failed to flag blocked bot");
                }
                DeliveryChannel::None
            }
            Err(e) => {
                // Transient failure: swallowed, no retry, no fallback
                warn!(account = %recipient.token, error = %e, "Transient Telegram delivery failure");
                DeliveryChannel::None
            }
        }
    }

    async fn send_push(&self, recipient: &Account, payload: &NotificationPayload) -> DeliveryChannel {
        if !self.push.enabled {
            return DeliveryChannel::None;
        }
        let Some(device_token) = recipient.device_token.as_deref() else {
            return DeliveryChannel::None;
        };

        let body = json!({
            "to": device_token,
            "notification": {
                "title": payload.title,
                "body": payload.body,
            },
            "data": {
                "chat_id": payload.chat_id,
                "type": "new_message",
            },
        });

        let result = self
            .http
            .post(&self.push.endpoint)
            .header("Authorization", format!("key={}", self.push.server_key))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => DeliveryChannel::Secondary,
            Ok(response) => {
                warn!(
                    account = %recipient.token,
                    status = %response.status(),
                    "Push delivery rejected"
                );
                DeliveryChannel::None
            }
            Err(e) => {
                warn!(account = %recipient.token, error = %e, "Push delivery failed");
                DeliveryChannel::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_prefers_telegram() {
        assert_eq!(delivery_route(Some(42), false, true), DeliveryRoute::Telegram(42));
        assert_eq!(delivery_route(Some(42), false, false), DeliveryRoute::Telegram(42));
    }

    #[test]
    fn test_blocked_bot_falls_back_to_push() {
        assert_eq!(delivery_route(Some(42), true, true), DeliveryRoute::Push);
        assert_eq!(delivery_route(None, false, true), DeliveryRoute::Push);
    }

    #[test]
    fn test_no_channel_available() {
        assert_eq!(delivery_route(None, false, false), DeliveryRoute::Nowhere);
        assert_eq!(delivery_route(Some(42), true, false), DeliveryRoute::Nowhere);
    }
}
