pub mod types;
pub mod sanitize;
pub mod segment;
pub mod context;
pub mod prompt;
pub mod parser;
pub mod extractor;
pub mod align;
pub mod processor;

pub use extractor::{ChunkedExtractor, ExtractionConfig};
pub use processor::{BatchRunner, DocumentProcessor};
pub use types::*;

use thiserror::Error;

use crate::ocr::AcquisitionError;

/// Per-document failures. The batch runner absorbs these into sentinel rows.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Uploaded document is empty")]
    EmptyDocument,

    #[error("Text acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),
}
