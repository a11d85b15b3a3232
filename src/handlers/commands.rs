//! Command handlers
//!
//! Entry points for the bot commands: onboarding with optional referral
//! deep links, account status, and the premium purchase entry point.

use teloxide::{prelude::*, types::LabeledPrice};
use tracing::warn;
use crate::database::service::DatabaseService;
use crate::handlers::HandlerResult;
use crate::services::ServiceFactory;
use crate::utils::logging::log_account_action;

/// Deep-link prefix carried in `/start` payloads for referral attribution
const REFERRAL_PREFIX: &str = "ref_";

/// Handle the /start command: initialize the account and register a
/// referral when the deep-link payload carries one
pub async fn handle_start(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    db: DatabaseService,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let telegram_id = user.id.0 as i64;

    let account = db.initialize_account(telegram_id, None).await?;
    log_account_action(&account.token, "start", None);

    // "/start ref_<token>" attributes this account to a referrer
    if let Some(payload) = msg
        .text()
        .and_then(|t| t.split_whitespace().nth(1))
        .and_then(|arg| arg.strip_prefix(REFERRAL_PREFIX))
    {
        if let Err(e) = services
            .referral_service
            .register(payload, &account.token)
            .await
        {
            warn!(account = %account.token, error = %e, "Referral registration rejected");
        }
    }

    bot.send_message(
        msg.chat.id,
        "Welcome to Anonimka! Open the mini app to browse listings and chat anonymously.",
    )
    .await?;

    Ok(())
}

/// Handle the /status command: current tier and referral statistics
pub async fn handle_status(
    bot: Bot,
    msg: Message,
    services: ServiceFactory,
    db: DatabaseService,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let Some(account) = db.accounts.find_by_telegram_id(user.id.0 as i64).await? else {
        bot.send_message(msg.chat.id, "No account found. Send /start first.")
            .await?;
        return Ok(());
    };

    let entitlement = services.entitlement_service.resolve_for(&account).await?;
    let (total, rewarded) = services.referral_service.stats(&account.token).await?;

    let tier = match (entitlement.premium, entitlement.until) {
        (true, Some(until)) => format!("PRO until {}", until.format("%Y-%m-%d")),
        (true, None) => "PRO".to_string(),
        (false, _) => "FREE".to_string(),
    };

    bot.send_message(
        msg.chat.id,
        format!("Tier: {tier}\nReferrals: {total} invited, {rewarded} rewarded"),
    )
    .await?;

    Ok(())
}

/// Handle the /premium command: send a Stars invoice for one month
pub async fn handle_premium(bot: Bot, msg: Message, months: i32) -> HandlerResult {
    let stars_price = 250 * months;

    bot.send_invoice(
        msg.chat.id,
        format!("Anonimka PRO, {months} month(s)"),
        "Unlimited photos, higher listing limits and priority chat requests".to_string(),
        format!("premium:{months}"),
        "XTR".to_string(),
        vec![LabeledPrice {
            label: "PRO subscription".to_string(),
            amount: stars_price as u32,
        }],
    )
    .await?;

    Ok(())
}

/// Handle the /help command
pub async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "/start - create or open your account\n\
         /status - show your tier and referrals\n\
         /premium - buy a PRO subscription\n\
         /help - this message",
    )
    .await?;

    Ok(())
}
