use crate::{core::config::json::JsonConfig, errors::MyError, util::enums::AudioStruct};
use async_trait::async_trait;
use bytes::Bytes;
use gem_rs::{
    api::Models,
    client::GemSession,
    types::{Blob, Context, HarmBlockThreshold, Role, Settings},
};
use log::error;
use std::time::Duration;
use teloxide::{prelude::*, types::FileId};

/// Speech-to-text backend. Any failure is a decode failure to the caller.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn decode(&self, file: &AudioStruct) -> Result<String, MyError>;
}

pub struct GeminiTranscriber {
    bot: Bot,
    json_config: JsonConfig,
}

impl GeminiTranscriber {
    pub fn new(bot: Bot, json_config: JsonConfig) -> Self {
        Self { bot, json_config }
    }

    /// The client gives up no later than the handler's own decode timeout.
    fn client_timeout(&self) -> Duration {
        self.json_config.get_quota().decode_timeout()
    }

    async fn to_text(&self, mime_type: &str, data: &Bytes) -> Result<String, MyError> {
        let mut settings = Settings::new();
        settings.set_all_safety_settings(HarmBlockThreshold::BlockNone);

        let ai_model = self.json_config.get_ai_model().to_owned();
        let prompt = self.json_config.get_ai_prompt().to_owned();

        let mut context = Context::new();
        context.push_message(Role::Model, prompt);

        let mut client = GemSession::Builder()
            .model(Models::Custom(ai_model))
            .timeout(Some(self.client_timeout()))
            .context(context)
            .build();

        match client
            .send_blob(Blob::new(mime_type, data), Role::User, &settings)
            .await
        {
            Ok(response) => transcript_from(response.get_results().first().cloned()),
            Err(err) => {
                error!("Transcription error: {:?}", err);
                Err(MyError::DecodeFailed(err.to_string()))
            }
        }
    }
}

fn transcript_from(result: Option<String>) -> Result<String, MyError> {
    match result {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(MyError::DecodeFailed("empty response".to_string())),
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn decode(&self, file: &AudioStruct) -> Result<String, MyError> {
        let data = save_file_to_memory(&self.bot, &file.file_id).await?;
        self.to_text(&file.mime_type, &data).await
    }
}

pub async fn save_file_to_memory(bot: &Bot, file_id: &str) -> Result<Bytes, MyError> {
    let file = bot.get_file(FileId(file_id.to_string())).send().await?;
    let file_url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );
    let response = reqwest::get(file_url).await?.error_for_status()?;
    Ok(response.bytes().await?)
}
