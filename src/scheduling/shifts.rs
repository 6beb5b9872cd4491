//! Shift Registry: weekly availability slots per caregiver.
//!
//! Doctor and nurse slots are two independent collections with the same
//! operations. A caregiver holds at most one slot per `(day_of_week, shift)`.
//! Slots are informational: booking does not consult them.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::validation::parse_time_field;
use super::SchedulingError;
use crate::authorization::{authorize, Action, Caller, Parties};
use crate::db::{self, begin_immediate, DatabaseError};
use crate::models::enums::{CaregiverKind, DayOfWeek, Shift};
use crate::models::{NewShiftSlot, ShiftSlot, ShiftSlotUpdate};

fn duplicate_slot(kind: CaregiverKind, day: DayOfWeek, shift: Shift) -> SchedulingError {
    SchedulingError::Conflict(format!(
        "{} already has a {shift} shift on {day}",
        kind.label()
    ))
}

/// A racing writer can still trip the UNIQUE index after our check.
fn map_write_error(err: DatabaseError, slot: &ShiftSlot) -> SchedulingError {
    if err.is_unique_violation() {
        duplicate_slot(slot.kind, slot.day_of_week, slot.shift)
    } else {
        err.into()
    }
}

fn ensure_caregiver_exists(
    conn: &Connection,
    kind: CaregiverKind,
    id: &Uuid,
) -> Result<(), SchedulingError> {
    let exists = match kind {
        CaregiverKind::Doctor => db::get_doctor(conn, id)?.is_some(),
        CaregiverKind::Nurse => db::get_nurse(conn, id)?.is_some(),
    };
    if !exists {
        return Err(SchedulingError::not_found(kind.label(), id));
    }
    Ok(())
}

fn ensure_slot_free(
    conn: &Connection,
    slot: &ShiftSlot,
    exclude: Option<&Uuid>,
) -> Result<(), SchedulingError> {
    let taken = db::find_shift_slot_id(
        conn,
        slot.kind,
        &slot.caregiver_id,
        slot.day_of_week,
        slot.shift,
        exclude,
    )?;
    if taken.is_some() {
        return Err(duplicate_slot(slot.kind, slot.day_of_week, slot.shift));
    }
    Ok(())
}

fn load(conn: &Connection, kind: CaregiverKind, id: &Uuid) -> Result<ShiftSlot, SchedulingError> {
    db::get_shift(conn, kind, id)?.ok_or_else(|| SchedulingError::not_found("ShiftSlot", id))
}

pub fn create_shift(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    kind: CaregiverKind,
    request: &NewShiftSlot,
) -> Result<ShiftSlot, SchedulingError> {
    authorize(caller, Action::manage_shift(kind), &Parties::caregiver(request.caregiver_id))?;

    // NIGHT runs past midnight, so start and end are not ordered.
    let slot = ShiftSlot {
        id: Uuid::new_v4(),
        kind,
        caregiver_id: request.caregiver_id,
        day_of_week: request.day_of_week,
        shift: request.shift,
        start_time: parse_time_field("start_time", &request.start_time)?,
        end_time: parse_time_field("end_time", &request.end_time)?,
        is_available: request.is_available,
        created_at: now,
    };

    let tx = begin_immediate(conn)?;
    ensure_caregiver_exists(&tx, kind, &slot.caregiver_id)?;
    ensure_slot_free(&tx, &slot, None)?;
    db::insert_shift(&tx, &slot).map_err(|e| map_write_error(e, &slot))?;
    tx.commit()?;

    tracing::info!(
        slot_id = %slot.id,
        kind = kind.as_str(),
        caregiver = %slot.caregiver_id,
        day = %slot.day_of_week,
        shift = %slot.shift,
        "Shift slot created"
    );
    Ok(slot)
}

pub fn get_shift(
    conn: &Connection,
    kind: CaregiverKind,
    id: &Uuid,
) -> Result<ShiftSlot, SchedulingError> {
    load(conn, kind, id)
}

/// A caregiver's slots, Monday first.
pub fn list_shifts(
    conn: &Connection,
    kind: CaregiverKind,
    caregiver_id: &Uuid,
) -> Result<Vec<ShiftSlot>, SchedulingError> {
    Ok(db::list_shifts_by_caregiver(conn, kind, caregiver_id)?)
}

/// Edit in place. Moving to another `(day, shift)` re-checks uniqueness.
pub fn update_shift(
    conn: &Connection,
    caller: &Caller,
    kind: CaregiverKind,
    id: &Uuid,
    update: &ShiftSlotUpdate,
) -> Result<ShiftSlot, SchedulingError> {
    let tx = begin_immediate(conn)?;
    let mut slot = load(&tx, kind, id)?;
    authorize(caller, Action::manage_shift(kind), &Parties::caregiver(slot.caregiver_id))?;

    let moves = update.day_of_week.is_some_and(|d| d != slot.day_of_week)
        || update.shift.is_some_and(|s| s != slot.shift);

    if let Some(day) = update.day_of_week {
        slot.day_of_week = day;
    }
    if let Some(shift) = update.shift {
        slot.shift = shift;
    }
    if let Some(raw) = &update.start_time {
        slot.start_time = parse_time_field("start_time", raw)?;
    }
    if let Some(raw) = &update.end_time {
        slot.end_time = parse_time_field("end_time", raw)?;
    }
    if let Some(available) = update.is_available {
        slot.is_available = available;
    }

    if moves {
        ensure_slot_free(&tx, &slot, Some(&slot.id))?;
    }
    db::update_shift(&tx, &slot).map_err(|e| map_write_error(e, &slot))?;
    tx.commit()?;

    tracing::info!(slot_id = %slot.id, kind = kind.as_str(), moved = moves, "Shift slot updated");
    Ok(slot)
}

pub fn delete_shift(
    conn: &Connection,
    caller: &Caller,
    kind: CaregiverKind,
    id: &Uuid,
) -> Result<(), SchedulingError> {
    let tx = begin_immediate(conn)?;
    let slot = load(&tx, kind, id)?;
    authorize(caller, Action::manage_shift(kind), &Parties::caregiver(slot.caregiver_id))?;
    db::delete_shift(&tx, kind, id)?;
    tx.commit()?;

    tracing::info!(slot_id = %id, kind = kind.as_str(), "Shift slot deleted");
    Ok(())
}
