use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_timestamp, not_found, parse_time, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::time::format_hhmm;
use crate::models::*;

/// (table, caregiver column) for each shift collection.
fn shift_table(kind: CaregiverKind) -> (&'static str, &'static str) {
    match kind {
        CaregiverKind::Doctor => ("doctor_shifts", "doctor_id"),
        CaregiverKind::Nurse => ("nurse_shifts", "nurse_id"),
    }
}

type ShiftRow = (String, String, String, String, String, String, i32, String);

fn read_shift_row(row: &Row<'_>) -> rusqlite::Result<ShiftRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn shift_from_row(kind: CaregiverKind, row: ShiftRow) -> Result<ShiftSlot, DatabaseError> {
    let (id, caregiver_id, day, shift, start, end, available, created_at) = row;
    Ok(ShiftSlot {
        id: parse_uuid(&id)?,
        kind,
        caregiver_id: parse_uuid(&caregiver_id)?,
        day_of_week: DayOfWeek::from_str(&day)?,
        shift: Shift::from_str(&shift)?,
        start_time: parse_time(&start)?,
        end_time: parse_time(&end)?,
        is_available: available != 0,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub fn insert_shift(conn: &Connection, slot: &ShiftSlot) -> Result<(), DatabaseError> {
    let (table, column) = shift_table(slot.kind);
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, {column}, day_of_week, shift, start_time, end_time,
             is_available, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            slot.id.to_string(),
            slot.caregiver_id.to_string(),
            slot.day_of_week.as_str(),
            slot.shift.as_str(),
            format_hhmm(&slot.start_time),
            format_hhmm(&slot.end_time),
            slot.is_available as i32,
            format_timestamp(&slot.created_at),
        ],
    )?;
    Ok(())
}

/// Rewrite the mutable columns. The caregiver column is never touched.
pub fn update_shift(conn: &Connection, slot: &ShiftSlot) -> Result<(), DatabaseError> {
    let (table, _) = shift_table(slot.kind);
    let changed = conn.execute(
        &format!(
            "UPDATE {table} SET day_of_week = ?2, shift = ?3, start_time = ?4, end_time = ?5,
             is_available = ?6 WHERE id = ?1"
        ),
        params![
            slot.id.to_string(),
            slot.day_of_week.as_str(),
            slot.shift.as_str(),
            format_hhmm(&slot.start_time),
            format_hhmm(&slot.end_time),
            slot.is_available as i32,
        ],
    )?;
    if changed == 0 {
        return Err(not_found("ShiftSlot", &slot.id));
    }
    Ok(())
}

pub fn get_shift(
    conn: &Connection,
    kind: CaregiverKind,
    id: &Uuid,
) -> Result<Option<ShiftSlot>, DatabaseError> {
    let (table, column) = shift_table(kind);
    let row = conn
        .query_row(
            &format!(
                "SELECT id, {column}, day_of_week, shift, start_time, end_time, is_available,
                 created_at FROM {table} WHERE id = ?1"
            ),
            params![id.to_string()],
            read_shift_row,
        )
        .optional()?;
    row.map(|r| shift_from_row(kind, r)).transpose()
}

pub fn list_shifts_by_caregiver(
    conn: &Connection,
    kind: CaregiverKind,
    caregiver_id: &Uuid,
) -> Result<Vec<ShiftSlot>, DatabaseError> {
    let (table, column) = shift_table(kind);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, {column}, day_of_week, shift, start_time, end_time, is_available, created_at
         FROM {table} WHERE {column} = ?1
         ORDER BY CASE day_of_week
             WHEN 'MONDAY' THEN 1 WHEN 'TUESDAY' THEN 2 WHEN 'WEDNESDAY' THEN 3
             WHEN 'THURSDAY' THEN 4 WHEN 'FRIDAY' THEN 5 WHEN 'SATURDAY' THEN 6
             ELSE 7 END, start_time ASC"
    ))?;
    let rows = stmt.query_map(params![caregiver_id.to_string()], read_shift_row)?;

    let mut slots = Vec::new();
    for row in rows {
        slots.push(shift_from_row(kind, row?)?);
    }
    Ok(slots)
}

/// Id of the slot occupying `(caregiver, day, shift)`, ignoring `exclude`.
pub fn find_shift_slot_id(
    conn: &Connection,
    kind: CaregiverKind,
    caregiver_id: &Uuid,
    day: DayOfWeek,
    shift: Shift,
    exclude: Option<&Uuid>,
) -> Result<Option<Uuid>, DatabaseError> {
    let (table, column) = shift_table(kind);
    let found: Option<String> = conn
        .query_row(
            &format!(
                "SELECT id FROM {table}
                 WHERE {column} = ?1 AND day_of_week = ?2 AND shift = ?3
                   AND (?4 IS NULL OR id != ?4)
                 LIMIT 1"
            ),
            params![
                caregiver_id.to_string(),
                day.as_str(),
                shift.as_str(),
                exclude.map(|id| id.to_string()),
            ],
            |row| row.get(0),
        )
        .optional()?;
    found.as_deref().map(parse_uuid).transpose()
}

pub fn delete_shift(
    conn: &Connection,
    kind: CaregiverKind,
    id: &Uuid,
) -> Result<(), DatabaseError> {
    let (table, _) = shift_table(kind);
    let deleted = conn.execute(
        &format!("DELETE FROM {table} WHERE id = ?1"),
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(not_found("ShiftSlot", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_doctor;
    use crate::db::sqlite::open_memory_database;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(doctor: Uuid, day: DayOfWeek, shift: Shift) -> ShiftSlot {
        ShiftSlot {
            id: Uuid::new_v4(),
            kind: CaregiverKind::Doctor,
            caregiver_id: doctor,
            day_of_week: day,
            shift,
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            is_available: true,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn setup() -> (Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let doctor = Uuid::new_v4();
        let ito = Doctor {
            id: doctor,
            name: "Dr. Ito".into(),
            specialty: None,
        };
        insert_doctor(&conn, &ito).unwrap();
        (conn, doctor)
    }

    #[test]
    fn unique_key_enforced_by_schema() {
        let (conn, doctor) = setup();
        insert_shift(&conn, &slot(doctor, DayOfWeek::Monday, Shift::Morning)).unwrap();
        let err =
            insert_shift(&conn, &slot(doctor, DayOfWeek::Monday, Shift::Morning)).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn listing_orders_by_weekday() {
        let (conn, doctor) = setup();
        insert_shift(&conn, &slot(doctor, DayOfWeek::Friday, Shift::Morning)).unwrap();
        insert_shift(&conn, &slot(doctor, DayOfWeek::Monday, Shift::Evening)).unwrap();
        insert_shift(&conn, &slot(doctor, DayOfWeek::Sunday, Shift::Night)).unwrap();

        let days: Vec<DayOfWeek> = list_shifts_by_caregiver(&conn, CaregiverKind::Doctor, &doctor)
            .unwrap()
            .into_iter()
            .map(|s| s.day_of_week)
            .collect();
        assert_eq!(days, vec![DayOfWeek::Monday, DayOfWeek::Friday, DayOfWeek::Sunday]);
    }

    #[test]
    fn find_slot_respects_exclusion() {
        let (conn, doctor) = setup();
        let s = slot(doctor, DayOfWeek::Tuesday, Shift::Afternoon);
        insert_shift(&conn, &s).unwrap();

        let find = |exclude| {
            find_shift_slot_id(
                &conn,
                CaregiverKind::Doctor,
                &doctor,
                DayOfWeek::Tuesday,
                Shift::Afternoon,
                exclude,
            )
            .unwrap()
        };
        assert_eq!(find(None), Some(s.id));
        let excluded = find(Some(&s.id));
        assert!(excluded.is_none());
    }

    #[test]
    fn nurse_collection_is_separate() {
        let (conn, doctor) = setup();
        insert_shift(&conn, &slot(doctor, DayOfWeek::Monday, Shift::Morning)).unwrap();
        assert!(list_shifts_by_caregiver(&conn, CaregiverKind::Nurse, &doctor).unwrap().is_empty());
    }
}
