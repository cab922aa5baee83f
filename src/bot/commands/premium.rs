use crate::{core::config::Config, errors::MyError};
use teloxide::{prelude::*, types::ReplyParameters};

pub async fn premium_handler(bot: Bot, message: Message, config: &Config) -> Result<(), MyError> {
    let caps = config.get_json_config().get_quota().caps();

    let text = format!(
        "Users with Telegram Premium get {} minutes of decoding instead of {}, \
        with no limit on the length of a single file.\n\n\
        Subscribe to Telegram Premium and your next file is decoded with the premium allowance.",
        caps.premium / 60,
        caps.free / 60
    );

    bot.send_message(message.chat.id, text)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;

    Ok(())
}
