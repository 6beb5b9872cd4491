use crate::db::DatabaseError;

/// Typed, recoverable outcome of every scheduling operation.
///
/// Each variant carries a human-readable reason that callers may show as-is.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Database error: {0}")]
    Database(DatabaseError),
    #[error("Scheduling state lock poisoned")]
    LockPoisoned,
}

impl SchedulingError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Stable machine-readable token for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Database(_) | Self::LockPoisoned => "INTERNAL",
        }
    }
}

impl From<DatabaseError> for SchedulingError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                id,
            },
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}
