use crate::bot::responder::longest_label_len;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, Environment};
use serde::Deserialize;
use std::env;
use dotenvy::dotenv;
use anyhow::{Result, bail};

/// Hard per-message cap on Discord.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub gemini_api_key: String,
    pub model_name: String,
    pub temperature: f32,
    pub chat_temperature: f32,
    pub max_output_tokens: u32,
    pub command_prefix: String,
    // Discord caps messages at 2000 chars; the default keeps headroom below it
    pub message_budget: usize,
    pub video_poll_interval_secs: u64,
    pub video_poll_max_attempts: u32,

    #[serde(default)]
    pub vision: VisionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisionSettings {
    pub enabled: bool,
    /// Label every png/jpg posted without a command. Needs `enabled`.
    pub auto_label: bool,
    pub api_key: Option<String>, // ADC when absent
    pub max_results: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_label: false,
            api_key: None,
            max_results: 10,
        }
    }
}

impl Settings {
    /// Layers defaults, the optional config file at `path` and `BOT__*` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenv().ok();

        let config = Self::builder(path)?
            .add_source(Environment::with_prefix("BOT").separator("__"))
            .build()?;
        let mut settings: Settings = config.try_deserialize()?;

        if settings.discord_token.is_empty() {
            if let Ok(token) = env::var("DISCORD_BOT_TOKEN") {
                settings.discord_token = token;
            } else if let Ok(token) = env::var("DISCORD_TOKEN") {
                settings.discord_token = token;
            }
        }

        if settings.gemini_api_key.is_empty() {
            if let Ok(key) = env::var("GEMINI_API_KEY") {
                settings.gemini_api_key = key;
            } else if let Ok(key) = env::var("GOOGLE_API_KEY") {
                settings.gemini_api_key = key;
            }
        }

        Ok(settings)
    }

    /// Defaults plus the optional file; no environment.
    fn builder(path: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let builder = Config::builder()
            .set_default("discord_token", "")?
            .set_default("gemini_api_key", "")?
            .set_default("model_name", "gemini-2.0-flash-exp")?
            .set_default("temperature", 1.0)?
            .set_default("chat_temperature", 0.5)?
            .set_default("max_output_tokens", 8192)?
            .set_default("command_prefix", "/")?
            .set_default("message_budget", 1990)?
            .set_default("video_poll_interval_secs", 10)?
            .set_default("video_poll_max_attempts", 60)?
            .set_default("vision.enabled", false)?
            .set_default("vision.auto_label", false)?
            .set_default("vision.api_key", None::<String>)?
            .set_default("vision.max_results", 10)?

            .add_source(File::with_name(path).required(false));

        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            bail!("missing Discord token: set DISCORD_BOT_TOKEN or BOT__DISCORD_TOKEN");
        }
        if self.gemini_api_key.trim().is_empty() {
            bail!("missing Gemini API key: set GEMINI_API_KEY or BOT__GEMINI_API_KEY");
        }
        // every labelled reply needs room for at least one char after its label
        let floor = longest_label_len() + 1;
        if self.message_budget < floor || self.message_budget > DISCORD_MESSAGE_LIMIT {
            bail!(
                "message_budget must be between {} and {}, got {}",
                floor,
                DISCORD_MESSAGE_LIMIT,
                self.message_budget
            );
        }
        if self.command_prefix.is_empty() {
            bail!("command_prefix must not be empty");
        }
        if self.vision.auto_label && !self.vision.enabled {
            bail!("vision.auto_label needs vision.enabled");
        }
        Ok(())
    }
}
