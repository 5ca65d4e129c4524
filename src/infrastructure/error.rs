use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Notification permission denied: {0}")]
    PermissionDenied(String),
    #[error("Notification gateway error: {0}")]
    Gateway(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}
