use crate::{
    bot::{
        dispatcher::{ErrorContext, handle_error, reported},
        transport::TelegramTransport,
    },
    core::{
        config::Config,
        services::{speech_recognition::SpeechRecognition, transcription::GeminiTranscriber},
    },
    errors::MyError,
    util::enums::{AudioEvent, AudioKind, AudioStruct},
};
use log::info;
use std::sync::Arc;
use teloxide::{Bot, types::Message};
use tokio::task;

pub fn audio_event(message: &Message) -> Option<AudioEvent> {
    let user = message.from.as_ref()?;

    let (kind, duration, file) = if let Some(audio) = message.audio() {
        let mime_type = audio
            .mime_type
            .as_ref()
            .map(|m| m.essence_str().to_owned())
            .unwrap_or_else(|| "audio/mpeg".to_owned());
        (
            AudioKind::Audio,
            audio.duration.seconds(),
            AudioStruct {
                mime_type,
                file_id: audio.file.id.0.to_owned(),
                file_unique_id: audio.file.unique_id.0.to_owned(),
            },
        )
    } else if let Some(voice) = message.voice() {
        let mime_type = voice
            .mime_type
            .as_ref()
            .map(|m| m.essence_str().to_owned())
            .unwrap_or_else(|| "audio/ogg".to_owned());
        (
            AudioKind::Voice,
            voice.duration.seconds(),
            AudioStruct {
                mime_type,
                file_id: voice.file.id.0.to_owned(),
                file_unique_id: voice.file.unique_id.0.to_owned(),
            },
        )
    } else {
        return None;
    };

    Some(AudioEvent {
        user_id: user.id.0,
        chat_id: message.chat.id.0,
        first_name: user.first_name.clone(),
        duration,
        kind,
        file,
    })
}

pub async fn handle_speech(bot: Bot, message: Message, config: Arc<Config>) -> Result<(), MyError> {
    if message.forward_from_user().is_some_and(|orig| orig.is_bot)
        || message.from.as_ref().is_none_or(|user| user.is_bot)
    {
        return Ok(());
    }

    let Some(event) = audio_event(&message) else {
        return Ok(());
    };

    let ctx = ErrorContext::from_message(&message);
    task::spawn(async move {
        info!(
            "{:?} {} of {}s from user {} in chat {}",
            event.kind, event.file.file_unique_id, event.duration, event.user_id, event.chat_id
        );

        let transport = TelegramTransport::new(bot.clone());
        let transcriber = GeminiTranscriber::new(bot.clone(), config.get_json_config().clone());
        let speech = SpeechRecognition {
            transport: &transport,
            transcriber: &transcriber,
            ledger: config.get_ledger(),
            settings: config.get_json_config().get_quota(),
        };

        reported(async { speech.handle(&event).await.map(|_| ()) }, |err| {
            handle_error(err, ctx, &config, &bot)
        })
        .await;
    });

    Ok(())
}
