use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::warn;

use crate::database::registry::SchemaError;

pub type ModelResult<T> = Result<T, ModelError>;

/// Errors returned by the managers.
///
/// Request rejections (validation, constraint violations, missing rows) are
/// kept apart from `StorageUnavailable` so callers can tell a bad request
/// from an infrastructure failure. Nothing here is retried.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} with this {field} already exists")]
    UniquenessViolation { entity: &'static str, field: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} references a parent row that does not exist")]
    ForeignKeyViolation { entity: &'static str },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] sqlx::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl ModelError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Classify a sqlx error raised while operating on `entity`.
    pub fn from_sqlx(entity: &'static str, error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &error {
            match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    return Self::UniquenessViolation {
                        entity,
                        field: unique_field(db_err.message()),
                    }
                }
                ErrorKind::ForeignKeyViolation => return Self::ForeignKeyViolation { entity },
                _ => {}
            }
        }

        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                warn!(entity, error = %error, "Storage unavailable");
                Self::StorageUnavailable(error)
            }
            other => {
                warn!(entity, error = %other, "Unclassified database error");
                Self::Database(other)
            }
        }
    }

    /// True for infrastructure failures a caller may choose to retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

/// Extract the column name from an engine message such as
/// `UNIQUE constraint failed: users.email`.
fn unique_field(message: &str) -> String {
    message
        .rsplit(": ")
        .next()
        .and_then(|columns| columns.split(',').next())
        .map(|column| column.trim())
        .map(|column| column.rsplit('.').next().unwrap_or(column).to_string())
        .filter(|column| !column.is_empty())
        .unwrap_or_else(|| "unique field".to_string())
}
