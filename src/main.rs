use anyhow::{Context, Result};
use clap::Parser;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod bot;
mod client;
mod config;
mod delivery;

use bot::handler::Handler;
use bot::responder::{Responder, ResponderOptions};
use client::auth::GoogleAuth;
use client::rest::GeminiClient;
use client::vision::VisionClient;
use config::Settings;

/// Discord bot relaying questions and uploads to Gemini.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file name, with or without extension
    #[arg(long, default_value = "config")]
    config: String,

    /// Override the configured model
    #[arg(long)]
    model: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = Args::parse();

    // 1. 載入設定
    let mut settings = Settings::load(&args.config).context("failed to load configuration")?;
    if let Some(model) = args.model {
        settings.model_name = model;
    }
    settings.validate()?;

    if args.check {
        info!(model = %settings.model_name, budget = settings.message_budget, "configuration OK");
        return Ok(());
    }

    // 2. 初始化 API 客戶端
    let gemini = GeminiClient::new(&settings.gemini_api_key)?;
    let vision = if settings.vision.enabled {
        let auth = GoogleAuth::new(settings.vision.api_key.as_deref()).await?;
        Some(VisionClient::new(auth, settings.vision.max_results))
    } else {
        None
    };

    let responder = Arc::new(Responder::new(gemini, vision, ResponderOptions::from(&settings)));
    let handler = Handler::new(responder, &settings.command_prefix, settings.vision.auto_label)?;

    // 3. 連接 Discord
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&settings.discord_token, intents)
        .event_handler(handler)
        .await
        .context("failed to create Discord client")?;

    info!(model = %settings.model_name, prefix = %settings.command_prefix, "starting bot");
    client.start().await.context("Discord client stopped")?;

    Ok(())
}
