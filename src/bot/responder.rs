//! Turns one parsed command into Gemini / Cloud Vision calls and posts the
//! answer back through a [`Destination`].

use crate::bot::attachments::{MediaKind, Upload};
use crate::bot::commands::{Command, help_text};
use crate::client::error::GeminiError;
use crate::client::files::{FileData, FileLookup, FileManager, FileState};
use crate::client::models::{GenerateContentRequest, GenerationConfig, Part};
use crate::client::rest::GeminiClient;
use crate::client::vision::{VisionClient, format_labels};
use crate::config::Settings;
use crate::delivery::{Destination, send_long_message};
use anyhow::Result;
use base64::prelude::*;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ResponderOptions {
    pub model: String,
    pub temperature: f32,
    pub chat_temperature: f32,
    pub max_output_tokens: u32,
    pub budget: usize,
    pub command_prefix: String,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
}

impl From<&Settings> for ResponderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.model_name.clone(),
            temperature: settings.temperature,
            chat_temperature: settings.chat_temperature,
            max_output_tokens: settings.max_output_tokens,
            budget: settings.message_budget,
            command_prefix: settings.command_prefix.clone(),
            poll_interval: Duration::from_secs(settings.video_poll_interval_secs),
            poll_max_attempts: settings.video_poll_max_attempts,
        }
    }
}

const ANSWER_LABEL: &str = "**Answer:** ";
const RESPONSE_LABEL: &str = "**Response:** ";

/// Per-command prompt, status line and answer label for attachment commands.
struct MediaTask {
    status: &'static str,
    prompt: &'static str,
    label: &'static str,
}

fn media_task(kind: MediaKind) -> MediaTask {
    match kind {
        MediaKind::Image => MediaTask {
            status: "🖼 Processing image...",
            prompt: "Describe this image.",
            label: "**Description:** ",
        },
        MediaKind::Pdf => MediaTask {
            status: "📄 Analyzing PDF...",
            prompt: "Summarize this PDF as bullet points.",
            label: "**Summary:** ",
        },
        MediaKind::Audio => MediaTask {
            status: "🎧 Analyzing audio...",
            prompt: "Listen carefully to the following audio file. Provide a brief summary.",
            label: "**Audio Summary:** ",
        },
        MediaKind::Video => MediaTask {
            status: "🎥 Analyzing video...",
            prompt: "Describe this video.",
            label: "**Video Description:** ",
        },
    }
}

/// Chars taken by the longest label a reply can start with.
pub fn longest_label_len() -> usize {
    [MediaKind::Image, MediaKind::Pdf, MediaKind::Audio, MediaKind::Video]
        .into_iter()
        .map(|kind| media_task(kind).label)
        .chain([ANSWER_LABEL, RESPONSE_LABEL])
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0)
}

pub struct Responder {
    gemini: GeminiClient,
    vision: Option<VisionClient>,
    options: ResponderOptions,
}

impl Responder {
    pub fn new(gemini: GeminiClient, vision: Option<VisionClient>, options: ResponderOptions) -> Self {
        Self { gemini, vision, options }
    }

    /// Runs `command`, reporting any failure to the channel instead of
    /// returning it.
    pub async fn respond<D: Destination>(&self, dest: &D, command: Command, upload: Option<Upload>) {
        let name = command.name();
        if let Err(e) = self.run(dest, command, upload).await {
            error!(command = name, "request failed: {:#}", e);
            self.notify(dest, &format!("I encountered an error while processing your request: {e}"))
                .await;
        }
    }

    /// Tells the channel that an attachment could not be fetched.
    pub async fn download_failed<D: Destination>(&self, dest: &D, filename: &str, err: &anyhow::Error) {
        warn!("Failed to download {}: {}", filename, err);
        self.notify(dest, &format!("😔 Could not download {filename}: {err}")).await;
    }

    pub async fn run<D: Destination>(&self, dest: &D, command: Command, upload: Option<Upload>) -> Result<()> {
        match command {
            Command::Ask(None) => self.say(dest, "Please provide a question.").await,
            Command::Ask(Some(question)) => {
                self.say(dest, "💡 Thinking about your question...").await?;
                let text = self
                    .generate(vec![Part::text(question)], self.options.temperature)
                    .await?;
                self.deliver(dest, ANSWER_LABEL, &text).await
            }
            Command::Chat(None) => self.say(dest, "Please provide a message to chat with.").await,
            Command::Chat(Some(message)) => {
                self.say(dest, "💡 Thinking...").await?;
                let text = self
                    .generate(vec![Part::text(message)], self.options.chat_temperature)
                    .await?;
                self.deliver(dest, RESPONSE_LABEL, &text).await
            }
            Command::Labels => {
                let Some(upload) = upload.filter(|u| MediaKind::Image.accepts(&u.mime_type)) else {
                    return self.say(dest, MediaKind::Image.missing_message()).await;
                };
                self.label_image(dest, &upload).await
            }
            Command::Help => {
                let text = help_text(&self.options.command_prefix);
                self.deliver(dest, "", &text).await
            }
            Command::Describe | Command::Summarize | Command::SummarizeAudio | Command::DescribeVideo => {
                let kind = command.media().unwrap_or(MediaKind::Image);
                let Some(upload) = upload.filter(|u| kind.accepts(&u.mime_type)) else {
                    return self.say(dest, kind.missing_message()).await;
                };
                self.analyze(dest, kind, upload).await
            }
        }
    }

    /// Cloud Vision labels for one image; the channel is told when vision is off.
    pub async fn label_image<D: Destination>(&self, dest: &D, upload: &Upload) -> Result<()> {
        let Some(vision) = &self.vision else {
            return self.say(dest, "Image labelling is not enabled on this bot.").await;
        };
        self.say(dest, "Processing your image...").await?;
        let labels = vision.label_detection(&upload.bytes).await?;
        info!(file = %upload.filename, count = labels.len(), "vision labels");
        self.deliver(dest, "", &format_labels(&labels)).await
    }

    async fn analyze<D: Destination>(&self, dest: &D, kind: MediaKind, upload: Upload) -> Result<()> {
        let task = media_task(kind);
        self.say(dest, task.status).await?;

        let media = if kind == MediaKind::Image && upload.fits_inline() {
            Part::inline_data(upload.mime_type, BASE64_STANDARD.encode(&upload.bytes))
        } else {
            let files = FileManager::new(&self.gemini);
            let mut file = files.upload(upload.bytes, &upload.filename, &upload.mime_type).await?;
            if kind == MediaKind::Video {
                self.say(dest, "Waiting for video to be processed...").await?;
                let ready = self.wait_until_active(dest, &files, &file.name).await?;
                file = ready;
                self.say(dest, "Video processing complete. Generating Description").await?;
            }
            Part::file_data(file.mime_type, file.uri)
        };

        let text = self
            .generate(vec![media, Part::text(task.prompt)], self.options.temperature)
            .await?;
        if kind == MediaKind::Video {
            info!(file = %upload.filename, "video description:\n{}", text);
        }
        self.deliver(dest, task.label, &text).await
    }

    /// Polls until the upload is usable. A failed or stalled file is an error.
    async fn wait_until_active<D: Destination, F: FileLookup>(
        &self,
        dest: &D,
        files: &F,
        name: &str,
    ) -> Result<FileData> {
        for attempt in 1..=self.options.poll_max_attempts {
            tokio::time::sleep(self.options.poll_interval).await;
            let file = files.lookup(name).await?;
            match file.state {
                FileState::Active => return Ok(file),
                FileState::Failed => return Err(GeminiError::ProcessingFailed(name.to_string()).into()),
                FileState::Processing | FileState::StateUnspecified => {
                    info!(name, attempt, "video still processing");
                    self.say(dest, "Video processing still in progress, please wait...").await?;
                }
            }
        }

        Err(GeminiError::ProcessingTimedOut {
            name: name.to_string(),
            attempts: self.options.poll_max_attempts,
        }
        .into())
    }

    async fn generate(&self, parts: Vec<Part>, temperature: f32) -> Result<String> {
        let request = GenerateContentRequest::single_turn(
            parts,
            GenerationConfig {
                temperature,
                max_output_tokens: self.options.max_output_tokens,
            },
        );
        let response = self.gemini.generate_content(&self.options.model, &request).await?;
        Ok(response.text())
    }

    async fn deliver<D: Destination>(&self, dest: &D, label: &str, text: &str) -> Result<()> {
        let sent = send_long_message(dest, label, text, self.options.budget).await?;
        info!(chars = text.chars().count(), messages = sent, "response delivered");
        Ok(())
    }

    /// Short status lines, sent as-is.
    async fn say<D: Destination>(&self, dest: &D, content: &str) -> Result<()> {
        send_long_message(dest, "", content, self.options.budget).await?;
        Ok(())
    }

    async fn notify<D: Destination>(&self, dest: &D, notice: &str) {
        if let Err(e) = send_long_message(dest, "", notice, self.options.budget).await {
            warn!("failed to report error to channel: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::{Recorder, Rejected};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers lookups with a fixed sequence of states, then `Processing`.
    struct ScriptedFiles {
        states: Mutex<VecDeque<FileState>>,
        lookups: Mutex<usize>,
    }

    impl ScriptedFiles {
        fn new(states: &[FileState]) -> Self {
            Self {
                states: Mutex::new(states.iter().copied().collect()),
                lookups: Mutex::new(0),
            }
        }

        fn lookups(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    #[async_trait]
    impl FileLookup for ScriptedFiles {
        async fn lookup(&self, name: &str) -> Result<FileData> {
            *self.lookups.lock().unwrap() += 1;
            let state = self.states.lock().unwrap().pop_front().unwrap_or(FileState::Processing);
            Ok(FileData {
                name: name.to_string(),
                display_name: Some("clip.mp4".into()),
                mime_type: "video/mp4".into(),
                size_bytes: None,
                uri: format!("https://generativelanguage.googleapis.com/v1beta/{name}"),
                state,
            })
        }
    }

    const STILL_PROCESSING: &str = "Video processing still in progress, please wait...";

    fn responder(budget: usize) -> Responder {
        let options = ResponderOptions {
            model: "gemini-2.0-flash-exp".into(),
            temperature: 1.0,
            chat_temperature: 0.5,
            max_output_tokens: 1024,
            budget,
            command_prefix: "/".into(),
            poll_interval: Duration::from_millis(1),
            poll_max_attempts: 3,
        };
        Responder::new(GeminiClient::new("test-key").unwrap(), None, options)
    }

    #[tokio::test]
    async fn test_missing_arguments_get_a_hint() {
        let r = responder(1990);
        let dest = Recorder::default();
        r.run(&dest, Command::Ask(None), None).await.unwrap();
        r.run(&dest, Command::Chat(None), None).await.unwrap();
        assert_eq!(
            dest.messages(),
            vec!["Please provide a question.", "Please provide a message to chat with."]
        );
    }

    #[tokio::test]
    async fn test_attachment_commands_require_matching_upload() {
        let r = responder(1990);
        let dest = Recorder::default();
        let pdf = Upload::new("paper.pdf", Some("application/pdf"), b"%PDF-1.7".to_vec());

        r.run(&dest, Command::Describe, Some(pdf.clone())).await.unwrap();
        r.run(&dest, Command::Summarize, None).await.unwrap();
        r.run(&dest, Command::SummarizeAudio, Some(pdf.clone())).await.unwrap();
        r.run(&dest, Command::DescribeVideo, Some(pdf)).await.unwrap();

        assert_eq!(
            dest.messages(),
            vec![
                "😔 Please upload an image with this command.",
                "😔 Please upload a PDF file with this command.",
                "😔 Please upload an audio file with this command.",
                "😔 Please upload a video file with this command.",
            ]
        );
    }

    #[tokio::test]
    async fn test_labels_without_vision_client() {
        let r = responder(1990);
        let dest = Recorder::default();
        let png = Upload::new("cat.png", None, vec![0x89, 0x50]);
        r.run(&dest, Command::Labels, Some(png)).await.unwrap();
        assert_eq!(dest.messages(), vec!["Image labelling is not enabled on this bot."]);
    }

    #[tokio::test]
    async fn test_help_is_chunked_to_budget() {
        let r = responder(60);
        let dest = Recorder::default();
        r.run(&dest, Command::Help, None).await.unwrap();

        let messages = dest.messages();
        assert!(messages.len() > 1);
        assert!(messages.iter().all(|m| m.chars().count() <= 60));
        assert_eq!(messages.concat(), help_text("/"));
    }

    #[test]
    fn test_longest_label_is_video_description() {
        assert_eq!(longest_label_len(), "**Video Description:** ".chars().count());
        assert_eq!(longest_label_len(), 23);
    }

    #[tokio::test]
    async fn test_video_poll_waits_until_active() {
        let r = responder(1990);
        let dest = Recorder::default();
        let files = ScriptedFiles::new(&[FileState::Processing, FileState::StateUnspecified, FileState::Active]);

        let file = r.wait_until_active(&dest, &files, "files/abc123").await.unwrap();
        assert_eq!(file.state, FileState::Active);
        assert_eq!(files.lookups(), 3);
        assert_eq!(dest.messages(), vec![STILL_PROCESSING, STILL_PROCESSING]);
    }

    #[tokio::test]
    async fn test_video_poll_reports_failed_file() {
        let r = responder(1990);
        let dest = Recorder::default();
        let files = ScriptedFiles::new(&[FileState::Processing, FileState::Failed]);

        let err = r.wait_until_active(&dest, &files, "files/abc123").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeminiError>(),
            Some(GeminiError::ProcessingFailed(name)) if name == "files/abc123"
        ));
        assert_eq!(err.to_string(), "video files/abc123 failed processing");
        assert_eq!(dest.messages(), vec![STILL_PROCESSING]);
    }

    #[tokio::test]
    async fn test_video_poll_times_out_after_max_attempts() {
        let r = responder(1990);
        let dest = Recorder::default();
        let files = ScriptedFiles::new(&[]);

        let err = r.wait_until_active(&dest, &files, "files/abc123").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeminiError>(),
            Some(GeminiError::ProcessingTimedOut { attempts: 3, .. })
        ));
        assert_eq!(files.lookups(), 3);
        assert_eq!(dest.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_video_poll_stops_when_progress_cannot_be_sent() {
        let r = responder(1990);
        let dest = Recorder::failing_on(1);
        let files = ScriptedFiles::new(&[]);

        let err = r.wait_until_active(&dest, &files, "files/abc123").await.unwrap_err();
        assert!(err.downcast_ref::<crate::delivery::chunker::DeliveryError<Rejected>>().is_some());
        assert_eq!(files.lookups(), 1);
    }

    #[tokio::test]
    async fn test_download_failure_is_reported() {
        let r = responder(1990);
        let dest = Recorder::default();
        let err = anyhow::anyhow!("HTTP 404 Not Found");

        r.download_failed(&dest, "clip.mp4", &err).await;
        assert_eq!(dest.messages(), vec!["😔 Could not download clip.mp4: HTTP 404 Not Found"]);
    }

    #[tokio::test]
    async fn test_send_failure_surfaces_from_run() {
        let r = responder(1990);
        let dest = Recorder::failing_on(1);
        let err = r.run(&dest, Command::Ask(None), None).await.unwrap_err();
        assert!(err.downcast_ref::<crate::delivery::chunker::DeliveryError<Rejected>>().is_some());
    }
}
