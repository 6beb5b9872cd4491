//! Interval Conflict Checker.
//!
//! A candidate interval `[start, end)` conflicts with an existing appointment
//! of the same caregiver on the same calendar day iff the two half-open
//! intervals intersect. Touching endpoints (09:00–09:30 then 09:30–10:00) do
//! not conflict.
//!
//! This module only reads. Callers that act on the answer must run the check
//! and their write inside the same immediate transaction.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::SchedulingError;
use crate::db::{list_caregiver_appointments_on, DatabaseError};
use crate::models::enums::CaregiverKind;
use crate::models::Appointment;

/// One caregiver's claim on an interval of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Booking {
    pub kind: CaregiverKind,
    pub caregiver_id: Uuid,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Booking {
    /// The booking an appointment holds for its caregiver of `kind`, if assigned.
    pub fn of(appt: &Appointment, kind: CaregiverKind) -> Option<Self> {
        appt.caregiver(kind).map(|caregiver_id| Self {
            kind,
            caregiver_id,
            date: appt.date,
            start: appt.start_time,
            end: appt.end_time,
        })
    }
}

/// Half-open overlap: `[s1, e1)` and `[s2, e2)` intersect.
pub fn overlaps(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

/// First appointment of the caregiver that overlaps `booking`.
///
/// `exclude` skips the appointment being rescheduled. With
/// `release_closed_slots`, REJECTED and CANCELLED appointments are ignored.
pub fn find_conflict(
    conn: &Connection,
    booking: &Booking,
    exclude: Option<&Uuid>,
    release_closed_slots: bool,
) -> Result<Option<Appointment>, DatabaseError> {
    let day =
        list_caregiver_appointments_on(conn, booking.kind, &booking.caregiver_id, &booking.date)?;

    Ok(day.into_iter().find(|existing| {
        Some(&existing.id) != exclude
            && !(release_closed_slots && existing.status.is_closed())
            && overlaps(booking.start, booking.end, existing.start_time, existing.end_time)
    }))
}

pub fn has_conflict(
    conn: &Connection,
    booking: &Booking,
    exclude: Option<&Uuid>,
    release_closed_slots: bool,
) -> Result<bool, DatabaseError> {
    Ok(find_conflict(conn, booking, exclude, release_closed_slots)?.is_some())
}

/// `Conflict` naming the caregiver kind when `booking` overlaps anything.
pub fn ensure_free(
    conn: &Connection,
    booking: &Booking,
    exclude: Option<&Uuid>,
    release_closed_slots: bool,
) -> Result<(), SchedulingError> {
    if let Some(existing) = find_conflict(conn, booking, exclude, release_closed_slots)? {
        tracing::warn!(
            caregiver = %booking.caregiver_id,
            kind = booking.kind.as_str(),
            date = %booking.date,
            existing = %existing.id,
            "Booking overlaps an existing appointment"
        );
        return Err(SchedulingError::Conflict(format!(
            "{} already has an appointment at this time",
            booking.kind.label()
        )));
    }
    Ok(())
}
