//! Crate-wide error type.
//!
//! File and geometry errors are resolved locally (the caller shows a message
//! and, for geometry, forces a re-upload). Network and response errors leave
//! the editor in a retryable `Failed` phase.

/// Everything that can go wrong between upload and decoded result.
#[derive(Debug)]
pub enum InpaintError {
    /// Uploaded bytes are not a decodable image.
    InvalidFile(String),
    /// Zero-dimension image or viewport, or an otherwise undefined transform.
    Geometry(String),
    /// Transport failure or non-2xx HTTP status.
    Network(String),
    /// Response body could not be parsed into images.
    MalformedResponse(String),
    /// An editing operation arrived before any image was loaded.
    NoImage,
    /// A submission is already in flight for this editor.
    Busy,
    /// PNG encoding of the image or mask failed.
    Encode(String),
    /// Local file read/write failed.
    Io(String),
    /// The session was cleared or replaced before the response arrived.
    Discarded,
}

impl InpaintError {
    /// Network and response failures can be retried without re-uploading or
    /// redrawing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InpaintError::Network(_) | InpaintError::MalformedResponse(_) | InpaintError::Busy
        )
    }
}

impl std::fmt::Display for InpaintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InpaintError::InvalidFile(e) => write!(f, "Not a valid image file: {}", e),
            InpaintError::Geometry(e) => write!(f, "Invalid image geometry: {}", e),
            InpaintError::Network(e) => write!(f, "Inference request failed: {}", e),
            InpaintError::MalformedResponse(e) => write!(f, "Malformed inference response: {}", e),
            InpaintError::NoImage => write!(f, "No image loaded"),
            InpaintError::Busy => write!(f, "A request is already in progress"),
            InpaintError::Encode(e) => write!(f, "PNG encode failed: {}", e),
            InpaintError::Io(e) => write!(f, "I/O error: {}", e),
            InpaintError::Discarded => write!(f, "Response discarded: session was reset"),
        }
    }
}

impl std::error::Error for InpaintError {}
