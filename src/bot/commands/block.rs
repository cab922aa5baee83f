use crate::{core::config::Config, errors::MyError};
use log::info;
use teloxide::{prelude::*, types::ReplyParameters};

pub async fn block_handler(
    bot: Bot,
    message: Message,
    config: &Config,
    arg: String,
) -> Result<(), MyError> {
    let Some(user) = message.from.as_ref() else {
        return Ok(());
    };

    let reply = if !config.is_id_in_owners(user.id.to_string()) {
        "This command is only available to the bot owners.".to_string()
    } else {
        match arg.trim().parse::<u64>() {
            Ok(target) => {
                config.get_ledger().block_user(target).await?;
                info!("User {} blocked by {}", target, user.id);
                format!("User {} can no longer use free decoding.", target)
            }
            Err(_) => "Usage: /block <user_id>".to_string(),
        }
    };

    bot.send_message(message.chat.id, reply)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;

    Ok(())
}
