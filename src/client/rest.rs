use super::error::GeminiError;
use super::models::*;
use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";

pub struct GeminiClient {
    pub client: Client,
    pub base_url: String,
    pub upload_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut api_key_value = HeaderValue::from_str(api_key)
            .context("Gemini API key contains invalid header characters")?;
        api_key_value.set_sensitive(true);
        headers.insert("x-goog-api-key", api_key_value);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            upload_url: UPLOAD_URL.to_string(),
        })
    }

    /// Non-streaming generation; a blocked prompt is an error, an empty
    /// candidate list is not.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let res = self.client.post(&url).json(request).send().await?;
        let response: GenerateContentResponse = res.error_for_status()?.json().await?;

        if let Some(meta) = &response.usage_metadata {
            debug!(
                model,
                input = meta.prompt_token_count,
                output = meta.candidates_token_count,
                total = meta.total_token_count,
                "generateContent usage"
            );
        }
        if let Some(reason) = response.block_reason() {
            return Err(GeminiError::Blocked(reason.to_string()).into());
        }

        Ok(response)
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url)
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url)
    }
}
