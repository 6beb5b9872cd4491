use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::AppointmentAuditEntry;

/// Append one forced status change. The id is assigned by SQLite.
pub fn insert_audit_entry(
    conn: &Connection,
    entry: &AppointmentAuditEntry,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_audit
             (appointment_id, from_status, to_status, actor_id, reason, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.appointment_id.to_string(),
            entry.from_status.as_str(),
            entry.to_status.as_str(),
            entry.actor_id.to_string(),
            entry.reason,
            format_timestamp(&entry.recorded_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Audit entries for one appointment, oldest first.
pub fn list_audit_entries(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentAuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, from_status, to_status, actor_id, reason, recorded_at
         FROM appointment_audit WHERE appointment_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![appointment_id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, appt, from, to, actor, reason, recorded_at)| {
            Ok(AppointmentAuditEntry {
                id,
                appointment_id: parse_uuid(&appt)?,
                from_status: AppointmentStatus::from_str(&from)?,
                to_status: AppointmentStatus::from_str(&to)?,
                actor_id: parse_uuid(&actor)?,
                reason,
                recorded_at: parse_timestamp(&recorded_at)?,
            })
        })
        .collect()
}
