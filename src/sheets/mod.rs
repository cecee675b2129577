//! Tabular destination: a header row plus appended answer rows.

pub mod google;

pub use google::GoogleSheetsSink;

use std::sync::LazyLock;
use std::sync::Mutex;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Spreadsheet service error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Spreadsheet service unreachable: {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Append-only row sink addressed by a destination id (allows mocking).
pub trait TableSink: Send + Sync {
    fn set_header(&self, destination: &str, header: &[String]) -> Result<(), SinkError>;

    fn append_rows(&self, destination: &str, rows: &[Vec<String>]) -> Result<(), SinkError>;
}

static SPREADSHEET_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([A-Za-z0-9_-]+)").expect("valid regex"));

/// Spreadsheet id from a sheet URL (`.../spreadsheets/d/<id>/edit`).
/// Input without a `/d/<id>` segment is taken as the id itself.
pub fn extract_spreadsheet_id(url_or_id: &str) -> String {
    let trimmed = url_or_id.trim();
    SPREADSHEET_ID_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Recorded sink operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Header { destination: String, header: Vec<String> },
    Append { destination: String, rows: Vec<Vec<String>> },
}

/// Mock sink that records every call; optionally fails all of them.
#[derive(Default)]
pub struct MockTableSink {
    calls: Mutex<Vec<SinkCall>>,
    failure: Option<SinkError>,
}

impl MockTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: SinkError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: SinkCall) -> Result<(), SinkError> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl TableSink for MockTableSink {
    fn set_header(&self, destination: &str, header: &[String]) -> Result<(), SinkError> {
        self.record(SinkCall::Header {
            destination: destination.to_string(),
            header: header.to_vec(),
        })
    }

    fn append_rows(&self, destination: &str, rows: &[Vec<String>]) -> Result<(), SinkError> {
        self.record(SinkCall::Append {
            destination: destination.to_string(),
            rows: rows.to_vec(),
        })
    }
}
