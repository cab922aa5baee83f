use crate::{
    bot::transport::{TelegramTransport, Transport},
    core::{
        config::Config,
        services::{
            admission::{Denial, Tier, TierCaps, remaining_time},
            ledger::{LedgerError, QuotaLedger},
        },
    },
    errors::MyError,
};
use log::error;
use teloxide::{prelude::*, types::ReplyParameters};

pub async fn usage_text(
    ledger: &QuotaLedger,
    caps: &TierCaps,
    user_id: u64,
    tier: Tier,
    first_name: &str,
) -> String {
    let consumed = match ledger.get_consumed(user_id, tier).await {
        Ok(consumed) => consumed,
        Err(LedgerError::UserNotFound) => 0,
        Err(LedgerError::PeriodCapPermanentlyExceeded) => {
            return Denial::Blocked {
                first_name: first_name.to_string(),
            }
            .to_string();
        }
        Err(e) => {
            error!("Failed to read usage of user {}: {}", user_id, e);
            return Denial::Unavailable.to_string();
        }
    };

    format!("Remaining free time: {}", remaining_time(tier, consumed, caps))
}

pub async fn usage_handler(bot: Bot, message: Message, config: &Config) -> Result<(), MyError> {
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };

    let transport = TelegramTransport::new(bot.clone());
    let tier = if transport.is_premium(user.id.0, message.chat.id.0).await {
        Tier::Premium
    } else {
        Tier::Free
    };

    let caps = config.get_json_config().get_quota().caps();
    let text = usage_text(config.get_ledger(), &caps, user.id.0, tier, &user.first_name).await;

    bot.send_message(message.chat.id, text)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;

    Ok(())
}
