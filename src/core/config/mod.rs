pub mod json;

use crate::core::db::{CounterStore, memory::MemoryCounterStore, redis::RedisCounterStore};
use crate::core::services::ledger::QuotaLedger;
use dotenv::dotenv;
use json::{JsonConfig, read_json_config};
use log::{error, warn};
use redis::Client as RedisClient;
use std::sync::Arc;
use teloxide::prelude::*;

#[derive(Clone)]
pub struct Config {
    bot: Bot,
    owners: Vec<String>,
    log_chat_id: String,
    error_chat_thread_id: String,
    version: String,
    json_config: JsonConfig,
    ledger: QuotaLedger,
}

impl Config {
    pub async fn new() -> Self {
        dotenv().ok();

        let Ok(bot_token) = std::env::var("BOT_TOKEN") else {
            error!("Expected BOT_TOKEN env var");
            std::process::exit(1);
        };
        let bot = Bot::new(bot_token);

        let owners: Vec<String> = std::env::var("OWNERS")
            .unwrap_or_default()
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let log_chat_id = std::env::var("LOG_CHAT_ID").unwrap_or_default();
        let error_chat_thread_id: String = std::env::var("ERROR_CHAT_THREAD_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.to_string());

        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
        let json_config = match read_json_config(&config_path) {
            Ok(json_config) => json_config,
            Err(e) => {
                error!("Unable to read {}: {}", config_path, e);
                std::process::exit(1);
            }
        };

        let store: Arc<dyn CounterStore> = match std::env::var("REDIS_URL") {
            Ok(redis_url) => {
                let Ok(redis_client) = RedisClient::open(redis_url) else {
                    error!("Failed to open Redis client");
                    std::process::exit(1);
                };
                Arc::new(RedisCounterStore::new(redis_client))
            }
            Err(_) => {
                warn!("REDIS_URL is not set, usage is kept in memory and lost on restart");
                Arc::new(MemoryCounterStore::default())
            }
        };
        let ledger = QuotaLedger::new(store, json_config.get_quota().period);

        Config {
            bot,
            owners,
            log_chat_id,
            error_chat_thread_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            json_config,
            ledger,
        }
    }

    pub fn get_bot(&self) -> &Bot {
        &self.bot
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn is_id_in_owners(&self, id: String) -> bool {
        self.owners.contains(&id)
    }

    pub fn get_log_chat_id(&self) -> &str {
        &self.log_chat_id
    }

    pub fn get_error_chat_thread_id(&self) -> &str {
        &self.error_chat_thread_id
    }

    pub fn get_json_config(&self) -> &JsonConfig {
        &self.json_config
    }

    pub fn get_ledger(&self) -> &QuotaLedger {
        &self.ledger
    }
}
