use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub trait SnapshotRepository: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, InfraError>;
    fn save(&self, key: &str, payload: &[u8]) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSnapshotRepository {
    db_path: PathBuf,
}

impl SqliteSnapshotRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    // Opens the database, applies the schema, and returns the repository.
    pub fn initialize(db_path: impl AsRef<Path>) -> Result<Self, InfraError> {
        let repository = Self::new(db_path);
        let connection = repository.connect()?;
        connection.execute_batch(SCHEMA_SQL)?;
        Ok(repository)
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, InfraError> {
        let connection = self.connect()?;
        let payload: Option<Vec<u8>> = connection
            .query_row(
                "SELECT payload FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn save(&self, key: &str, payload: &[u8]) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO snapshots (key, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            params![key, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
}

impl SnapshotRepository for InMemorySnapshotRepository {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, InfraError> {
        let payloads = self
            .payloads
            .lock()
            .map_err(|error| InfraError::Persistence(format!("snapshot lock poisoned: {error}")))?;
        Ok(payloads.get(key).cloned())
    }

    fn save(&self, key: &str, payload: &[u8]) -> Result<(), InfraError> {
        let mut payloads = self
            .payloads
            .lock()
            .map_err(|error| InfraError::Persistence(format!("snapshot lock poisoned: {error}")))?;
        payloads.insert(key.to_string(), payload.to_vec());
        Ok(())
    }
}
