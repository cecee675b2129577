use std::sync::Mutex;

use super::{AcquisitionError, MediaKind, TextAcquirer};

/// Mock acquirer: fixed result, records the media kinds it was asked for.
pub struct MockTextAcquirer {
    result: Result<String, AcquisitionError>,
    requests: Mutex<Vec<(usize, MediaKind)>>,
}

impl MockTextAcquirer {
    pub fn new(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: AcquisitionError) -> Self {
        Self {
            result: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(byte length, media kind)` per call.
    pub fn requests(&self) -> Vec<(usize, MediaKind)> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TextAcquirer for MockTextAcquirer {
    fn acquire(&self, bytes: &[u8], media: MediaKind) -> Result<String, AcquisitionError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((bytes.len(), media));
        match &self.result {
            Ok(text) if text.trim().is_empty() => Err(AcquisitionError::EmptyResult),
            other => other.clone(),
        }
    }
}
