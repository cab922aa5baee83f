use crate::errors::MyError;
use async_trait::async_trait;
use log::warn;
use teloxide::prelude::*;

/// The chat side of a conversation: who is premium, and where text goes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn is_premium(&self, user_id: u64, chat_id: i64) -> bool;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MyError>;
}

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn is_premium(&self, user_id: u64, chat_id: i64) -> bool {
        match self.bot.get_chat_member(ChatId(chat_id), UserId(user_id)).await {
            Ok(member) => member.user.is_premium,
            Err(e) => {
                warn!("Could not resolve premium status of {}: {}", user_id, e);
                false
            }
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MyError> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }
}
