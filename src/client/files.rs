use crate::client::error::GeminiError;
use crate::client::rest::GeminiClient;
use serde::{Deserialize, Serialize};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Body, Response};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub name: String,
    pub display_name: Option<String>,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub state: FileState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
}

#[derive(Debug, Serialize)]
struct UploadMetadata {
    file: FileMetadata,
}

#[derive(Debug, Serialize)]
struct FileMetadata {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileData,
}

/// Looks up the current state of an uploaded file.
#[async_trait]
pub trait FileLookup: Sync {
    async fn lookup(&self, name: &str) -> Result<FileData>;
}

pub struct FileManager<'a> {
    client: &'a GeminiClient,
}

impl<'a> FileManager<'a> {
    pub fn new(client: &'a GeminiClient) -> Self {
        Self { client }
    }

    /// Resumable upload in two requests: open a session, then send the bytes
    /// and finalize.
    pub async fn upload(&self, bytes: Vec<u8>, display_name: &str, mime_type: &str) -> Result<FileData> {
        let size = bytes.len();
        let metadata = UploadMetadata {
            file: FileMetadata { display_name: display_name.to_string() },
        };

        let res: Response = self.client.post(&self.client.upload_url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&metadata)
            .send()
            .await?;

        let res = res.error_for_status()?;
        let upload_url = res.headers().get("x-goog-upload-url")
            .ok_or(GeminiError::MissingUploadUrl)?
            .to_str()?
            .to_string();

        let res: Response = self.client.client.put(&upload_url)
            .header(CONTENT_TYPE, mime_type)
            .header("Content-Length", size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(Body::from(bytes))
            .send()
            .await?;

        let response: UploadResponse = res.error_for_status()?.json().await?;
        debug!(name = %response.file.name, state = ?response.file.state, "file uploaded");
        Ok(response.file)
    }

    /// `name` is the resource name returned by upload, e.g. `files/abc123`.
    pub async fn get(&self, name: &str) -> Result<FileData> {
        let url = format!("{}/{}", self.client.base_url, name);
        let res: Response = self.client.get(&url).send().await?;
        let file: FileData = res.error_for_status()?.json().await?;
        Ok(file)
    }
}

#[async_trait]
impl FileLookup for FileManager<'_> {
    async fn lookup(&self, name: &str) -> Result<FileData> {
        self.get(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_data_parses_state() {
        let raw = r#"{
            "name": "files/abc123",
            "displayName": "clip.mp4",
            "mimeType": "video/mp4",
            "sizeBytes": "1048576",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
            "state": "PROCESSING"
        }"#;
        let file: FileData = serde_json::from_str(raw).unwrap();
        assert_eq!(file.state, FileState::Processing);
        assert_eq!(file.display_name.as_deref(), Some("clip.mp4"));
    }

    #[test]
    fn test_missing_state_is_unspecified() {
        let raw = r#"{"name": "files/x", "mimeType": "application/pdf", "uri": "u"}"#;
        let file: FileData = serde_json::from_str(raw).unwrap();
        assert_eq!(file.state, FileState::StateUnspecified);
        assert!(file.size_bytes.is_none());
    }
}
