use crate::{
    bot::{
        commands::{
            block::block_handler, premium::premium_handler, start::start_handler,
            usage::usage_handler,
        },
        dispatcher::{ErrorContext, handle_error, reported},
    },
    core::config::Config,
    errors::MyError,
    util::enums::Command,
};
use std::sync::Arc;
use teloxide::{Bot, prelude::Message};
use tokio::task;

pub async fn command_handlers(
    bot: Bot,
    message: Message,
    cmd: Command,
    config: Arc<Config>,
) -> Result<(), MyError> {
    let ctx = ErrorContext::from_message(&message);
    task::spawn(async move {
        let reporter_bot = bot.clone();
        let task = async {
            match cmd {
                Command::Start => start_handler(bot, message, &config).await,
                Command::Usage => usage_handler(bot, message, &config).await,
                Command::Premium => premium_handler(bot, message, &config).await,
                Command::Block(arg) => block_handler(bot, message, &config, arg).await,
            }
        };
        reported(task, |err| handle_error(err, ctx, &config, &reporter_bot)).await;
    });
    Ok(())
}
