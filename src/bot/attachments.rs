use mime_guess::from_path;

// Larger uploads go through the File API instead of inline base64
pub const MAX_INLINE_SIZE: usize = 20 * 1024 * 1024; // 20MB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Audio,
    Video,
}

impl MediaKind {
    pub fn accepts(self, mime: &str) -> bool {
        match self {
            Self::Image => mime.starts_with("image/"),
            Self::Pdf => mime == "application/pdf",
            Self::Audio => mime.starts_with("audio/"),
            Self::Video => mime.starts_with("video/"),
        }
    }

    pub fn missing_message(self) -> &'static str {
        match self {
            Self::Image => "😔 Please upload an image with this command.",
            Self::Pdf => "😔 Please upload a PDF file with this command.",
            Self::Audio => "😔 Please upload an audio file with this command.",
            Self::Video => "😔 Please upload a video file with this command.",
        }
    }
}

/// An attachment's bytes, already fetched from the chat platform.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = resolve_mime(&filename, content_type);
        Self { filename, mime_type, bytes }
    }

    pub fn fits_inline(&self) -> bool {
        self.bytes.len() <= MAX_INLINE_SIZE
    }
}

/// Trusts the platform's content type, falling back to the file extension.
pub fn resolve_mime(filename: &str, content_type: Option<&str>) -> String {
    match content_type {
        Some(ct) if !ct.trim().is_empty() => {
            // drop parameters such as "; charset=utf-8"
            ct.split(';').next().unwrap_or(ct).trim().to_lowercase()
        }
        _ => from_path(filename).first_or_octet_stream().to_string(),
    }
}

/// Plain image posts that get Cloud Vision labels when auto-labelling is on.
pub fn is_label_candidate(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    ["png", "jpg", "jpeg"].iter().any(|ext| lower.ends_with(ext))
}
