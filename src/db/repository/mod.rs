//! Repository layer — entity-scoped database operations.
//!
//! Functions take a plain `&Connection` so callers can pass either a
//! connection or an open transaction (which derefs to one).

mod appointment;
mod audit;
mod clinical;
mod directory;
mod shift;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::time::parse_hhmm;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Re-export all public items from sub-modules
pub use appointment::*;
pub use audit::*;
pub use clinical::*;
pub use directory::*;
pub use shift::*;

// ── Column decoding ──────────────────────────────────────

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad uuid {raw}: {e}")))
}

pub(crate) fn parse_opt_uuid(raw: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    raw.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad date {raw}: {e}")))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, DatabaseError> {
    parse_hhmm(raw).ok_or_else(|| DatabaseError::ConstraintViolation(format!("bad time {raw}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn not_found(entity_type: &str, id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip() {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        let s = format_timestamp(&ts);
        assert_eq!(s, "2024-06-01 09:15:00");
        assert_eq!(parse_timestamp(&s).unwrap(), ts);
    }

    #[test]
    fn bad_columns_are_constraint_violations() {
        assert!(matches!(parse_uuid("nope"), Err(DatabaseError::ConstraintViolation(_))));
        assert!(matches!(parse_date("2024-13-01"), Err(DatabaseError::ConstraintViolation(_))));
        assert!(matches!(parse_time("9:00"), Err(DatabaseError::ConstraintViolation(_))));
    }
}
