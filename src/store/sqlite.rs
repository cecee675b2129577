use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{StoreError, Template, TemplateStore};

/// SQLite-backed template store. One connection behind a mutex.
pub struct SqliteTemplateStore {
    conn: Mutex<Connection>,
}

impl SqliteTemplateStore {
    /// Open (creating parent directories) and migrate.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Run all pending migrations.
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_templates.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

/// Current schema version (0 before the first migration).
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

impl TemplateStore for SqliteTemplateStore {
    fn put(&self, owner: &str, name: &str, template: &Template) -> Result<(), StoreError> {
        let schema_json = serde_json::to_string(&template.schema)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO templates (owner, name, schema_json, destination, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(owner, name) DO UPDATE SET
                schema_json = excluded.schema_json,
                destination = excluded.destination,
                created_at = excluded.created_at",
            params![owner, name, schema_json, template.destination, template.created_at],
        )?;
        Ok(())
    }

    fn get(&self, owner: &str, name: &str) -> Result<Option<Template>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row = conn
            .query_row(
                "SELECT schema_json, destination, created_at FROM templates
                 WHERE owner = ?1 AND name = ?2",
                params![owner, name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((schema_json, destination, created_at)) => Ok(Some(Template {
                schema: serde_json::from_str(&schema_json)?,
                destination,
                created_at,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(labels: &[&str], destination: &str) -> Template {
        Template {
            schema: labels.iter().map(|s| s.to_string()).collect(),
            destination: destination.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_schema_order() {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        let saved = template(&["Q2 年齢", "Q1 氏名", "Q1 氏名"], "sheet-a");
        store.put("uid-1", "survey", &saved).unwrap();

        let loaded = store.get("uid-1", "survey").unwrap().unwrap();
        assert_eq!(loaded.schema, saved.schema);
        assert_eq!(loaded.destination, "sheet-a");
        assert_eq!(loaded.created_at, saved.created_at);
    }

    #[test]
    fn later_write_replaces() {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        store.put("uid-1", "survey", &template(&["Q1"], "old")).unwrap();
        store.put("uid-1", "survey", &template(&["Q1", "Q2"], "new")).unwrap();

        let loaded = store.get("uid-1", "survey").unwrap().unwrap();
        assert_eq!(loaded.destination, "new");
        assert_eq!(loaded.schema.len(), 2);
    }

    #[test]
    fn missing_template_is_none() {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        assert!(store.get("uid-1", "nope").unwrap().is_none());
    }

    #[test]
    fn migration_idempotent() {
        let store = SqliteTemplateStore::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        assert!(run_migrations(&conn).is_ok());
        assert_eq!(get_current_version(&conn), 1);
    }

    #[test]
    fn persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("templates.db");
        {
            let store = SqliteTemplateStore::open(&path).unwrap();
            store.put("uid-1", "survey", &template(&["Q1"], "sheet")).unwrap();
        }
        let reopened = SqliteTemplateStore::open(&path).unwrap();
        assert!(reopened.get("uid-1", "survey").unwrap().is_some());
    }
}
