use crate::bot::attachments::{Upload, is_label_candidate};
use crate::bot::commands::{Command, CommandParser};
use crate::bot::responder::Responder;
use crate::delivery::Destination;
use anyhow::Result;
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::{Attachment, Message};
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// A Discord channel as a message destination.
pub struct ChannelDestination {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelDestination {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Destination for ChannelDestination {
    type Error = serenity::Error;

    async fn send(&self, content: &str) -> Result<(), serenity::Error> {
        self.channel_id.say(&self.http, content).await?;
        Ok(())
    }
}

pub struct Handler {
    responder: Arc<Responder>,
    parser: CommandParser,
    auto_label: bool,
}

impl Handler {
    pub fn new(responder: Arc<Responder>, prefix: &str, auto_label: bool) -> Result<Self> {
        Ok(Self {
            responder,
            parser: CommandParser::new(prefix)?,
            auto_label,
        })
    }

    async fn label_images(&self, dest: &ChannelDestination, attachments: &[Attachment]) {
        for attachment in attachments.iter().filter(|a| is_label_candidate(&a.filename)) {
            let upload = match fetch(attachment).await {
                Ok(upload) => upload,
                Err(e) => {
                    self.responder.download_failed(dest, &attachment.filename, &e).await;
                    continue;
                }
            };
            self.responder.respond(dest, Command::Labels, Some(upload)).await;
        }
    }
}

async fn fetch(attachment: &Attachment) -> Result<Upload> {
    let bytes = attachment.download().await?;
    Ok(Upload::new(attachment.filename.clone(), attachment.content_type.as_deref(), bytes))
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        info!("Message Received: {} (from {})", msg.content, msg.author.name);

        let dest = ChannelDestination::new(ctx.http.clone(), msg.channel_id);

        let Some(command) = self.parser.parse(&msg.content) else {
            if self.auto_label && !msg.attachments.is_empty() {
                self.label_images(&dest, &msg.attachments).await;
            }
            return;
        };
        debug!(command = command.name(), "dispatching command");

        let upload = match (command.media(), msg.attachments.first()) {
            (Some(_), Some(attachment)) => match fetch(attachment).await {
                Ok(upload) => Some(upload),
                Err(e) => {
                    self.responder.download_failed(&dest, &attachment.filename, &e).await;
                    return;
                }
            },
            _ => None,
        };

        self.responder.respond(&dest, command, upload).await;
    }

    async fn ready(&self, _: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);
    }
}
