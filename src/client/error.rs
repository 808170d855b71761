use thiserror::Error;

/// API responses that arrived fine over HTTP but can't be used.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("prompt was blocked ({0})")]
    Blocked(String),
    #[error("no upload URL returned")]
    MissingUploadUrl,
    #[error("video {0} failed processing")]
    ProcessingFailed(String),
    #[error("video {name} still processing after {attempts} checks")]
    ProcessingTimedOut { name: String, attempts: u32 },
    #[error("vision error {code}: {message}")]
    Vision { code: i32, message: String },
}
