use crate::client::auth::GoogleAuth;
use crate::client::error::GeminiError;
use serde::{Deserialize, Serialize};
use anyhow::Result;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use base64::prelude::*;

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest {
    image: Image,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct Image {
    content: String, // base64
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    feature_type: String,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<Label>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub description: String,
    #[serde(default)]
    pub score: f32,
}

pub struct VisionClient {
    client: Client,
    auth: GoogleAuth,
    max_results: u32,
}

impl VisionClient {
    pub fn new(auth: GoogleAuth, max_results: u32) -> Self {
        Self {
            client: Client::new(),
            auth,
            max_results,
        }
    }

    async fn prepare_request(&self, request_builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        if let Some(token) = self.auth.get_token().await? {
            Ok(request_builder.header(AUTHORIZATION, format!("Bearer {}", token)))
        } else if let Some(key) = self.auth.get_api_key() {
            Ok(request_builder.header("x-goog-api-key", key))
        } else {
            Ok(request_builder)
        }
    }

    pub async fn label_detection(&self, image: &[u8]) -> Result<Vec<Label>> {
        let request = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: Image { content: BASE64_STANDARD.encode(image) },
                features: vec![Feature {
                    feature_type: "LABEL_DETECTION".to_string(),
                    max_results: self.max_results,
                }],
            }],
        };

        let req = self.prepare_request(self.client.post(ANNOTATE_URL).json(&request)).await?;
        let response: AnnotateResponse = req.send().await?.error_for_status()?.json().await?;

        let Some(first) = response.responses.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(status) = first.error {
            return Err(GeminiError::Vision { code: status.code, message: status.message }.into());
        }
        Ok(first.label_annotations)
    }
}

pub fn format_labels(labels: &[Label]) -> String {
    let mut description = String::from("I found the following objects in the image:\n");
    for label in labels {
        description.push_str(&format!("- {} (Confidence: {:.2}%)\n", label.description, label.score * 100.0));
    }
    description
}
