use crate::core::services::admission::TierCaps;
use crate::core::services::ledger::QuotaPeriod;
use crate::errors::MyError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct JsonConfig {
    pub ai_model: String,
    pub ai_prompt: String,
    #[serde(default)]
    pub quota: QuotaSettings,
}

impl JsonConfig {
    pub fn get_ai_model(&self) -> &str {
        &self.ai_model
    }

    pub fn get_ai_prompt(&self) -> &str {
        &self.ai_prompt
    }

    pub fn get_quota(&self) -> &QuotaSettings {
        &self.quota
    }
}

/// Tier caps and delivery limits. Every field falls back to its default
/// when `config.json` leaves it out.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct QuotaSettings {
    pub free_cap_seconds: u32,
    pub premium_cap_seconds: u32,
    pub max_message_length: usize,
    pub decode_timeout_seconds: u64,
    pub period: QuotaPeriod,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        let caps = TierCaps::default();
        Self {
            free_cap_seconds: caps.free,
            premium_cap_seconds: caps.premium,
            max_message_length: 4000,
            decode_timeout_seconds: 300,
            period: QuotaPeriod::default(),
        }
    }
}

impl QuotaSettings {
    pub fn caps(&self) -> TierCaps {
        TierCaps {
            free: self.free_cap_seconds,
            premium: self.premium_cap_seconds,
        }
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_seconds)
    }
}

pub fn read_json_config<P: AsRef<Path>>(path: P) -> Result<JsonConfig, MyError> {
    let contents = std::fs::read_to_string(path)?;
    let config: JsonConfig = serde_json::from_str(&contents)?;
    Ok(config)
}
