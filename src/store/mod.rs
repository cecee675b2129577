//! Template storage: question schema and destination per
//! (owner, template name).

pub mod sqlite;

pub use sqlite::SqliteTemplateStore;

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::types::QuestionSchema;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Stored schema is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub schema: QuestionSchema,
    /// Opaque destination id (spreadsheet id).
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

/// Keyed template store (allows mocking).
pub trait TemplateStore: Send + Sync {
    /// Insert or replace.
    fn put(&self, owner: &str, name: &str, template: &Template) -> Result<(), StoreError>;

    fn get(&self, owner: &str, name: &str) -> Result<Option<Template>, StoreError>;
}

/// Process-local store for tests and local runs.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<HashMap<(String, String), Template>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn put(&self, owner: &str, name: &str, template: &Template) -> Result<(), StoreError> {
        self.templates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((owner.to_string(), name.to_string()), template.clone());
        Ok(())
    }

    fn get(&self, owner: &str, name: &str) -> Result<Option<Template>, StoreError> {
        Ok(self
            .templates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(owner.to_string(), name.to_string()))
            .cloned())
    }
}
