//! Recognized-text acquisition: document bytes in, full text out.
//!
//! Images are recognized synchronously. Paginated documents (PDF, TIFF)
//! go through an asynchronous job whose input and output live in a
//! temporary object-store bucket.

pub mod mock;
pub mod storage;
pub mod vision;

pub use mock::MockTextAcquirer;
pub use storage::{GcsObjectStore, ObjectStore, TempObjects};
pub use vision::GoogleVisionAcquirer;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("Recognition returned no text")]
    EmptyResult,

    #[error("Recognition output not found under {prefix}")]
    OutputNotFound { prefix: String },

    #[error("Recognition service error: {0}")]
    Upstream(String),

    #[error("Recognition timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Recognition not configured: {0}")]
    Config(String),
}

/// Media kind of an uploaded document, as far as recognition cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Tiff,
}

impl MediaKind {
    /// Classify from the client's content type, falling back to the file
    /// name. Anything unrecognized is treated as an image.
    pub fn classify(content_type: Option<&str>, file_name: Option<&str>) -> Self {
        let declared = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

        let essence = declared.or_else(|| {
            file_name
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_ascii_lowercase())
        });

        match essence.as_deref() {
            Some("application/pdf") => MediaKind::Pdf,
            Some("image/tiff") => MediaKind::Tiff,
            _ => MediaKind::Image,
        }
    }

    pub fn is_paginated(self) -> bool {
        matches!(self, MediaKind::Pdf | MediaKind::Tiff)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image/*",
            MediaKind::Pdf => "application/pdf",
            MediaKind::Tiff => "image/tiff",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => "img",
            MediaKind::Pdf => "pdf",
            MediaKind::Tiff => "tiff",
        }
    }
}

/// Recognized-text capability (allows mocking).
pub trait TextAcquirer: Send + Sync {
    /// Full recognized text of the document. Empty output is
    /// [`AcquisitionError::EmptyResult`].
    fn acquire(&self, bytes: &[u8], media: MediaKind) -> Result<String, AcquisitionError>;
}
