//! Payment handlers
//!
//! Telegram Stars purchase flow: approve the pre-checkout query, then
//! apply the completed payment to the subscription ledger. The payment
//! callback may be delivered more than once; the ledger resolves replays
//! by transaction id.

use teloxide::{prelude::*, types::PreCheckoutQuery};
use tracing::{error, info, warn};
use crate::database::service::DatabaseService;
use crate::handlers::HandlerResult;
use crate::services::ServiceFactory;

/// Parse an invoice payload of the form `premium:{months}`
fn parse_premium_payload(payload: &str) -> Option<i32> {
    payload.strip_prefix("premium:")?.parse().ok()
}

/// Approve pre-checkout for recognizable payloads
pub async fn handle_pre_checkout(bot: Bot, query: PreCheckoutQuery) -> HandlerResult {
    let recognized = parse_premium_payload(&query.invoice_payload).is_some();
    if !recognized {
        warn!(payload = %query.invoice_payload, "Rejecting pre-checkout with unknown payload");
    }

    bot.answer_pre_checkout_query(query.id, recognized).await?;
    Ok(())
}

/// Apply a completed Stars payment to the payer's subscription
pub async fn handle_successful_payment(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    db: DatabaseService,
) -> HandlerResult {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let Some(months) = parse_premium_payload(&payment.invoice_payload) else {
        error!(
            payload = %payment.invoice_payload,
            "Completed payment carries unknown payload"
        );
        return Ok(());
    };

    let telegram_id = user.id.0 as i64;
    let Some(account) = db.accounts.find_by_telegram_id(telegram_id).await? else {
        error!(telegram_id = telegram_id, "Completed payment for unknown account");
        return Ok(());
    };

    let premium_until = services
        .subscription_service
        .activate(
            &account.token,
            months,
            &payment.telegram_payment_charge_id,
            payment.total_amount as i64,
        )
        .await?;

    info!(
        account = %account.token,
        months = months,
        premium_until = %premium_until,
        "Premium purchase applied"
    );

    bot.send_message(
        msg.chat.id,
        format!("PRO activated until {}. Enjoy!", premium_until.format("%Y-%m-%d")),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parsing() {
        assert_eq!(parse_premium_payload("premium:1"), Some(1));
        assert_eq!(parse_premium_payload("premium:12"), Some(12));
        assert_eq!(parse_premium_payload("premium:"), None);
        assert_eq!(parse_premium_payload("gift:1"), None);
        assert_eq!(parse_premium_payload(""), None);
    }
}
