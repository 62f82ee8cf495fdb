use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit entry not found: {audit_id}")]
    NotFound { audit_id: String },
}

pub type Result<T> = std::result::Result<T, AuditError>;
