use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::llm::SafetyThreshold;
use crate::pipeline::ExtractionConfig;

/// Application-level constants
pub const APP_NAME: &str = "survey-extract";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RECOGNITION_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 900;
/// Timeout for plain REST calls (storage, sheets, identity).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "survey_extract=info,tower_http=info"
}

/// Application data directory (`<data_dir>/survey-extract`).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite path for the template store.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("templates.db")
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub completion_timeout_secs: u64,
    pub extraction: ExtractionConfig,
    pub vision_api_key: Option<String>,
    pub google_access_token: Option<String>,
    pub temp_bucket: Option<String>,
    pub recognition_timeout_secs: u64,
    pub firebase_api_key: String,
    pub database_path: PathBuf,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bind_addr: SocketAddr = parse_or(&get, "BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;

        let defaults = ExtractionConfig::default();
        let extraction = ExtractionConfig {
            batch_size: parse_or(&get, "EXTRACT_BATCH_SIZE", Some(defaults.batch_size))?,
            primary_model: get("EXTRACT_PRIMARY_MODEL").unwrap_or(defaults.primary_model),
            secondary_model: get("EXTRACT_SECONDARY_MODEL").unwrap_or(defaults.secondary_model),
            safety: parse_or::<SafetyThreshold, _>(
                &get,
                "EXTRACT_SAFETY_THRESHOLD",
                Some(defaults.safety),
            )?,
            ..defaults
        };

        Ok(Self {
            bind_addr,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            completion_timeout_secs: parse_or(
                &get,
                "COMPLETION_TIMEOUT_SECS",
                Some(DEFAULT_COMPLETION_TIMEOUT_SECS),
            )?,
            extraction,
            vision_api_key: get("VISION_API_KEY"),
            google_access_token: get("GOOGLE_ACCESS_TOKEN"),
            temp_bucket: get("TEMP_BUCKET"),
            recognition_timeout_secs: parse_or(
                &get,
                "RECOGNITION_TIMEOUT_SECS",
                Some(DEFAULT_RECOGNITION_TIMEOUT_SECS),
            )?,
            firebase_api_key: required("FIREBASE_API_KEY")?,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            request_timeout_secs: parse_or(
                &get,
                "REQUEST_TIMEOUT_SECS",
                Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            )?,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[("GEMINI_API_KEY", "g"), ("FIREBASE_API_KEY", "f")];

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.completion_timeout_secs, 120);
        assert_eq!(config.recognition_timeout_secs, 600);
        assert_eq!(config.request_timeout_secs, 900);
        assert_eq!(config.extraction, ExtractionConfig::default());
        assert!(config.temp_bucket.is_none());
        assert!(config.database_path.ends_with("templates.db"));
    }

    #[test]
    fn required_keys_are_enforced() {
        let err = AppConfig::from_lookup(lookup(&[("FIREBASE_API_KEY", "f")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GEMINI_API_KEY"));

        let err = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "g"), ("FIREBASE_API_KEY", "  ")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("FIREBASE_API_KEY"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("EXTRACT_BATCH_SIZE", "6"),
            ("EXTRACT_PRIMARY_MODEL", "gemini-2.5-pro"),
            ("EXTRACT_SAFETY_THRESHOLD", "block_only_high"),
            ("TEMP_BUCKET", "scratch"),
            ("DATABASE_PATH", "/tmp/t.db"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.extraction.batch_size, 6);
        assert_eq!(config.extraction.primary_model, "gemini-2.5-pro");
        assert_eq!(config.extraction.secondary_model, "gemini-2.5-flash-lite");
        assert_eq!(config.extraction.safety, SafetyThreshold::BlockOnlyHigh);
        assert_eq!(config.temp_bucket.as_deref(), Some("scratch"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/t.db"));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("COMPLETION_TIMEOUT_SECS", "soon"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "COMPLETION_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn app_data_dir_is_named() {
        assert!(app_data_dir().ends_with(APP_NAME));
    }
}
