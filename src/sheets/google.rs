//! Google Sheets `values` REST sink.

use serde::Serialize;

use super::{SinkError, TableSink};
use crate::google::{truncate_body, GoogleAuth};

const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com/v4";
const HEADER_RANGE: &str = "A1";
const ROWS_RANGE: &str = "A2";

#[derive(Serialize)]
struct ValueRange<'a> {
    values: &'a [Vec<String>],
}

pub struct GoogleSheetsSink {
    base_url: String,
    auth: GoogleAuth,
    client: reqwest::blocking::Client,
}

impl GoogleSheetsSink {
    pub fn new(auth: GoogleAuth, timeout_secs: u64) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SinkError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: DEFAULT_SHEETS_URL.to_string(),
            auth,
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, destination: &str, range: &str, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.base_url, destination, range, suffix
        )
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<(), SinkError> {
        let response = self.auth.apply(request).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                SinkError::Connection(e.to_string())
            } else {
                SinkError::HttpClient(e.to_string())
            }
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(SinkError::Upstream {
            status: status.as_u16(),
            body: truncate_body(body),
        })
    }
}

impl TableSink for GoogleSheetsSink {
    fn set_header(&self, destination: &str, header: &[String]) -> Result<(), SinkError> {
        let values = [header.to_vec()];
        let request = self
            .client
            .put(self.values_url(destination, HEADER_RANGE, ""))
            .query(&[("valueInputOption", "RAW")])
            .json(&ValueRange { values: &values });
        self.send(request)
    }

    fn append_rows(&self, destination: &str, rows: &[Vec<String>]) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.values_url(destination, ROWS_RANGE, ":append"))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&ValueRange { values: rows });
        self.send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_values_urls() {
        let sink = GoogleSheetsSink::new(GoogleAuth::Anonymous, 5)
            .unwrap()
            .with_base_url("http://localhost:9/v4/");
        assert_eq!(
            sink.values_url("sheet", HEADER_RANGE, ""),
            "http://localhost:9/v4/spreadsheets/sheet/values/A1"
        );
        assert_eq!(
            sink.values_url("sheet", ROWS_RANGE, ":append"),
            "http://localhost:9/v4/spreadsheets/sheet/values/A2:append"
        );
    }

    #[test]
    fn value_range_body_shape() {
        let rows = vec![vec!["Alice".to_string(), "N/A".to_string()]];
        let body = serde_json::to_value(ValueRange { values: &rows }).unwrap();
        assert_eq!(body, serde_json::json!({ "values": [["Alice", "N/A"]] }));
    }

    #[test]
    fn empty_append_makes_no_request() {
        let sink = GoogleSheetsSink::new(GoogleAuth::Anonymous, 1)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        assert!(sink.append_rows("sheet", &[]).is_ok());
    }
}
