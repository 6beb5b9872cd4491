pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// True when SQLite rejected a write on a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        self.constraint_code() == Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
    }

    /// True when SQLite rejected a write on a FOREIGN KEY constraint.
    ///
    /// `ON DELETE RESTRICT` actions report through the trigger code, so that
    /// one counts too when the message names the foreign key.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self.constraint_code() {
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => true,
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER) => self
                .constraint_message()
                .is_some_and(|msg| msg.contains("FOREIGN KEY")),
            _ => false,
        }
    }

    fn constraint_code(&self) -> Option<i32> {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Some(err.extended_code)
            }
            _ => None,
        }
    }

    fn constraint_message(&self) -> Option<&str> {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(_, msg)) => msg.as_deref(),
            _ => None,
        }
    }
}
