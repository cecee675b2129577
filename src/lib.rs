pub mod api;
pub mod auth; // bearer credential → uid
pub mod config;
pub mod google; // shared credentials for the Google REST adapters
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod service;
pub mod sheets;
pub mod store;
pub mod template;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::{AppConfig, ConfigError, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::google::GoogleAuth;

/// Anything that stops the process before it serves requests.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Completion client: {0}")]
    Model(#[from] llm::ModelError),

    #[error("Recognition client: {0}")]
    Acquisition(#[from] ocr::AcquisitionError),

    #[error("Template store: {0}")]
    Store(#[from] store::StoreError),

    #[error("Spreadsheet client: {0}")]
    Sink(#[from] sheets::SinkError),

    #[error("Identity client: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Construct every collaborator from configuration.
///
/// The adapters use `reqwest::blocking`, so this must run outside the
/// async runtime.
pub fn build_api_context(config: &AppConfig) -> Result<ApiContext, StartupError> {
    let bearer = config.google_access_token.as_deref();
    let vision_auth = GoogleAuth::from_parts(config.vision_api_key.as_deref(), bearer);
    let storage_auth = GoogleAuth::from_parts(None, bearer);

    let object_store = Arc::new(ocr::GcsObjectStore::new(
        storage_auth.clone(),
        DEFAULT_HTTP_TIMEOUT_SECS,
    )?);
    let acquirer = ocr::GoogleVisionAcquirer::new(
        vision_auth,
        object_store,
        config.temp_bucket.clone(),
        DEFAULT_HTTP_TIMEOUT_SECS,
        config.recognition_timeout_secs,
    )?;
    let client = llm::GeminiClient::new(
        &config.gemini_base_url,
        &config.gemini_api_key,
        config.completion_timeout_secs,
    )?;
    let template_store = store::SqliteTemplateStore::open(&config.database_path)?;
    let sink = sheets::GoogleSheetsSink::new(storage_auth, DEFAULT_HTTP_TIMEOUT_SECS)?;
    let verifier = auth::FirebaseVerifier::new(&config.firebase_api_key, DEFAULT_HTTP_TIMEOUT_SECS)?;

    let service = service::SurveyService::new(
        Arc::new(acquirer),
        Arc::new(client),
        config.extraction.clone(),
        Arc::new(template_store),
        Arc::new(sink),
        Duration::from_secs(config.request_timeout_secs),
    );

    tracing::info!(
        primary_model = %config.extraction.primary_model,
        secondary_model = %config.extraction.secondary_model,
        batch_size = config.extraction.effective_batch_size(),
        pdf_enabled = config.temp_bucket.is_some(),
        database = %config.database_path.display(),
        "Services configured"
    );

    Ok(ApiContext::new(Arc::new(service), Arc::new(verifier)))
}

pub fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Survey extract starting v{}", config::APP_VERSION);

    let config = AppConfig::from_env()?;
    let ctx = build_api_context(&config)?;
    let app = api::api_router(ctx);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = api::server::bind(config.bind_addr).await?;
        api::server::serve(listener, app, api::server::ctrl_c()).await
    })?;
    Ok(())
}
