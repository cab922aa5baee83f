use crate::{
    bot::{commander::command_handlers, messager::handle_speech},
    core::config::Config,
    errors::MyError,
    util::enums::Command,
};
use log::{error, info};
use std::{convert::Infallible, fmt::Write, ops::ControlFlow, sync::Arc};
use teloxide::{
    Bot,
    dispatching::{Dispatcher, DpHandlerDescription, HandlerExt, MessageFilterExt, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::{ChatId, Handler, Message, Requester},
    types::{Me, MessageId, ThreadId, Update, UpdateKind},
    update_listeners::Polling,
    utils::command::BotCommands,
};
use teloxide::payloads::SendMessageSetters;

async fn root_handler(
    update: Update,
    config: Arc<Config>,
    bot: Bot,
    logic: Arc<Handler<'static, Result<(), MyError>, DpHandlerDescription>>,
    me: Me,
) -> Result<(), Infallible> {
    let deps = dptree::deps![update.clone(), config.clone(), bot.clone(), me];
    let result = logic.dispatch(deps).await;

    if let ControlFlow::Break(Err(err)) = result {
        handle_error(err, ErrorContext::from_update(&update), &config, &bot).await;
    }

    Ok(())
}

pub fn logic_handlers() -> Handler<'static, Result<(), MyError>, DpHandlerDescription> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handlers),
        )
        .branch(
            Update::filter_message()
                .branch(Message::filter_audio().endpoint(handle_speech))
                .branch(Message::filter_voice().endpoint(handle_speech)),
        )
}

pub async fn run() -> Result<(), MyError> {
    let config = Arc::new(Config::new().await);

    let command_menu = Command::bot_commands();
    let bot = config.get_bot();
    bot.set_my_commands(command_menu).await?;

    let me = bot.get_me().await?;
    info!("Bot name: {:?}", me.username());

    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot.clone(), dptree::endpoint(root_handler))
        .dependencies(dptree::deps![config.clone(), Arc::new(logic_handlers()), me])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(listener, LoggingErrorHandler::new())
        .await;

    Ok(())
}

/// Who triggered a failing handler, for the error report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub chat_id: Option<i64>,
    pub user: Option<(u64, String)>,
}

impl ErrorContext {
    pub fn from_message(message: &Message) -> Self {
        Self {
            chat_id: Some(message.chat.id.0),
            user: message
                .from
                .as_ref()
                .map(|user| (user.id.0, user.full_name())),
        }
    }

    fn from_update(update: &Update) -> Self {
        match &update.kind {
            UpdateKind::Message(m) => Self::from_message(m),
            _ => Self::default(),
        }
    }
}

pub fn error_report(err: &MyError, ctx: &ErrorContext) -> String {
    let mut message_text = String::new();

    let _ = writeln!(&mut message_text, "New error!\n");
    match ctx.chat_id {
        Some(chat_id) => {
            let _ = writeln!(&mut message_text, "Chat: {}", chat_id);
        }
        None => {
            let _ = writeln!(&mut message_text, "Chat: (???)");
        }
    }
    match &ctx.user {
        Some((id, name)) => {
            let _ = writeln!(&mut message_text, "User: {} ({})", name, id);
        }
        None => {
            let _ = writeln!(&mut message_text, "User: (???)");
        }
    }
    let _ = write!(&mut message_text, "\nError:\n{}\n\n#error", err);

    message_text
}

/// Awaits `task` and hands its error, if any, to `reporter`.
pub async fn reported<T, R, F>(task: T, reporter: R)
where
    T: Future<Output = Result<(), MyError>>,
    R: FnOnce(MyError) -> F,
    F: Future<Output = ()>,
{
    if let Err(err) = task.await {
        reporter(err).await;
    }
}

/// Logs the error and, when `LOG_CHAT_ID` is set, posts a report there.
pub async fn handle_error(err: MyError, ctx: ErrorContext, config: &Config, bot: &Bot) {
    error!("An error has occurred: {:?}", err);

    let Ok(log_chat_id) = config.get_log_chat_id().parse::<i64>() else {
        return;
    };

    let mut request = bot.send_message(ChatId(log_chat_id), error_report(&err, &ctx));
    if let Ok(thread_id) = config.get_error_chat_thread_id().parse::<i32>()
        && thread_id != 0
    {
        request = request.message_thread_id(ThreadId(MessageId(thread_id)));
    }

    match request.await {
        Ok(_) => info!("Error report sent successfully to chat {}", log_chat_id),
        Err(e) => error!("Failed to send error report to chat {}: {}", log_chat_id, e),
    }
}
