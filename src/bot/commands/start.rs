use crate::{core::config::Config, errors::MyError};
use teloxide::{prelude::*, types::ReplyParameters};

pub async fn start_handler(bot: Bot, message: Message, config: &Config) -> Result<(), MyError> {
    let caps = config.get_json_config().get_quota().caps();
    let name = message
        .from
        .as_ref()
        .map(|user| user.first_name.clone())
        .unwrap_or_else(|| "there".to_string());

    let response_message = format!(
        "Hi, {name}!\n\n\
        Send me an audio file or a voice message and I will reply with its transcript.\n\n\
        Free users can decode up to {} minutes of audio, premium users up to {} minutes.\n\
        Use /usage to see how much time you have left.\n\n\
        Version {}",
        caps.free / 60,
        caps.premium / 60,
        config.get_version()
    );

    bot.send_message(message.chat.id, response_message)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;

    Ok(())
}
