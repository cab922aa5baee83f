use teloxide::macros::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "what this bot does")]
    Start,
    #[command(description = "show your remaining decoding time")]
    Usage,
    #[command(description = "about premium")]
    Premium,
    #[command(hide)]
    Block(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Audio,
    Voice,
}

#[derive(Debug, Clone)]
pub struct AudioStruct {
    pub mime_type: String,
    pub file_id: String,
    pub file_unique_id: String,
}

/// One inbound audio or voice message, reduced to what quota handling needs.
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub user_id: u64,
    pub chat_id: i64,
    pub first_name: String,
    pub duration: u32,
    pub kind: AudioKind,
    pub file: AudioStruct,
}
