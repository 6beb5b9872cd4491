//! Appointment Workflow Engine.
//!
//! Owns the appointment state machine:
//!
//! ```text
//!                    ┌──────────► REJECTED
//!                    │ doctor
//! PENDING_APPROVAL ──┼──────────► APPROVED ──┬──► COMPLETED  (doctor)
//!        │           │                        ├──► NO_SHOW    (doctor)
//!        │ patient   │                        │ patient
//!        └───────────┴──────► CANCELLED ◄─────┘
//! ```
//!
//! Every transition runs load → authorize → guard → write inside one
//! immediate transaction. Admin field edits never touch status; the only way
//! around the guards is [`force_transition`], which leaves an audit row.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::conflict::{ensure_free, Booking};
use super::validation::{ensure_ordered, non_blank, parse_interval, parse_time_field};
use super::SchedulingError;
use crate::authorization::{
    authorize, can_view_appointment, filter_visible, Action, Caller, Parties,
};
use crate::config::SchedulingConfig;
use crate::db::{self, begin_immediate, AppointmentScope};
use crate::models::enums::{AppointmentStatus, CaregiverKind};
use crate::models::*;

/// Stored as `cancel_reason` when the patient gives none.
pub const DEFAULT_CANCEL_REASON: &str = "Cancelled by patient";

/// One role-gated edge of the state machine.
struct Transition {
    action: Action,
    from: &'static [AppointmentStatus],
    to: AppointmentStatus,
    verb: &'static str,
}

const APPROVE: Transition = Transition {
    action: Action::ApproveAppointment,
    from: &[AppointmentStatus::PendingApproval],
    to: AppointmentStatus::Approved,
    verb: "approve",
};

const REJECT: Transition = Transition {
    action: Action::RejectAppointment,
    from: &[AppointmentStatus::PendingApproval],
    to: AppointmentStatus::Rejected,
    verb: "reject",
};

const CANCEL: Transition = Transition {
    action: Action::CancelAppointment,
    from: &[AppointmentStatus::PendingApproval, AppointmentStatus::Approved],
    to: AppointmentStatus::Cancelled,
    verb: "cancel",
};

const COMPLETE: Transition = Transition {
    action: Action::CompleteAppointment,
    from: &[AppointmentStatus::Approved],
    to: AppointmentStatus::Completed,
    verb: "complete",
};

const NO_SHOW: Transition = Transition {
    action: Action::MarkNoShow,
    from: &[AppointmentStatus::Approved],
    to: AppointmentStatus::NoShow,
    verb: "mark as no-show",
};

fn load(conn: &Connection, id: &Uuid) -> Result<Appointment, SchedulingError> {
    db::get_appointment(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))
}

fn resolve_patient(conn: &Connection, id: &Uuid) -> Result<Patient, SchedulingError> {
    db::get_patient(conn, id)?.ok_or_else(|| SchedulingError::not_found("Patient", id))
}

fn resolve_doctor(conn: &Connection, id: &Uuid) -> Result<Doctor, SchedulingError> {
    db::get_doctor(conn, id)?.ok_or_else(|| SchedulingError::not_found("Doctor", id))
}

fn resolve_nurse(conn: &Connection, id: &Uuid) -> Result<Nurse, SchedulingError> {
    db::get_nurse(conn, id)?.ok_or_else(|| SchedulingError::not_found("Nurse", id))
}

/// Check every caregiver `appt` holds against everyone else's bookings.
fn ensure_caregivers_free(
    conn: &Connection,
    appt: &Appointment,
    exclude: Option<&Uuid>,
    config: &SchedulingConfig,
) -> Result<(), SchedulingError> {
    for kind in [CaregiverKind::Doctor, CaregiverKind::Nurse] {
        if let Some(booking) = Booking::of(appt, kind) {
            ensure_free(conn, &booking, exclude, config.release_closed_slots)?;
        }
    }
    Ok(())
}

fn apply_transition(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
    now: NaiveDateTime,
    transition: &Transition,
    guard: impl FnOnce(&mut Appointment) -> Result<(), SchedulingError>,
) -> Result<Appointment, SchedulingError> {
    let tx = begin_immediate(conn)?;
    let mut appt = load(&tx, id)?;
    authorize(caller, transition.action, &Parties::of_appointment(&appt))?;

    if !transition.from.contains(&appt.status) {
        return Err(SchedulingError::PreconditionFailed(format!(
            "Cannot {} an appointment that is {}",
            transition.verb, appt.status
        )));
    }
    guard(&mut appt)?;

    let from = appt.status;
    appt.status = transition.to;
    appt.updated_at = now;
    db::update_appointment(&tx, &appt)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        from = %from,
        to = %appt.status,
        actor = %caller.profile_id,
        "Appointment status changed"
    );
    Ok(appt)
}

// ═══════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════

/// Book a new appointment in `PENDING_APPROVAL`.
///
/// Resolves patient then doctor, checks the doctor's day, then resolves and
/// checks the nurse if one is named. Any failure leaves nothing written.
pub fn create_appointment(
    conn: &Connection,
    config: &SchedulingConfig,
    now: NaiveDateTime,
    caller: &Caller,
    request: &NewAppointment,
) -> Result<Appointment, SchedulingError> {
    authorize(caller, Action::CreateAppointment, &Parties::patient(request.patient_id))?;
    let (start_time, end_time) = parse_interval(&request.start_time, &request.end_time)?;

    let appt = Appointment {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        doctor_id: request.doctor_id,
        nurse_id: request.nurse_id,
        date: request.date,
        start_time,
        end_time,
        status: AppointmentStatus::PendingApproval,
        reason: non_blank(request.reason.as_deref()),
        notes: non_blank(request.notes.as_deref()),
        rejection_reason: None,
        cancel_reason: None,
        is_first_visit: request.is_first_visit,
        is_virtual: request.is_virtual,
        virtual_meeting_link: non_blank(request.virtual_meeting_link.as_deref()),
        reminder_sent_at: None,
        created_at: now,
        updated_at: now,
    };

    let tx = begin_immediate(conn)?;
    resolve_patient(&tx, &appt.patient_id)?;
    resolve_doctor(&tx, &appt.doctor_id)?;
    if let Some(doctor) = Booking::of(&appt, CaregiverKind::Doctor) {
        ensure_free(&tx, &doctor, None, config.release_closed_slots)?;
    }
    if let Some(nurse_id) = appt.nurse_id {
        resolve_nurse(&tx, &nurse_id)?;
        if let Some(nurse) = Booking::of(&appt, CaregiverKind::Nurse) {
            ensure_free(&tx, &nurse, None, config.release_closed_slots)?;
        }
    }
    db::insert_appointment(&tx, &appt)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        patient = %appt.patient_id,
        doctor = %appt.doctor_id,
        date = %appt.date,
        "Appointment booked"
    );
    Ok(appt)
}

// ═══════════════════════════════════════════════════════════
// Role-gated transitions
// ═══════════════════════════════════════════════════════════

pub fn approve_appointment(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
) -> Result<Appointment, SchedulingError> {
    apply_transition(conn, caller, id, now, &APPROVE, |_| Ok(()))
}

/// Reject with a mandatory reason, kept in `rejection_reason`.
pub fn reject_appointment(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
    reason: &str,
) -> Result<Appointment, SchedulingError> {
    apply_transition(conn, caller, id, now, &REJECT, |appt| {
        let reason = non_blank(Some(reason)).ok_or_else(|| {
            SchedulingError::InvalidArgument("A rejection reason is required".into())
        })?;
        appt.rejection_reason = Some(reason);
        Ok(())
    })
}

/// Patient cancel. Allowed only while the scheduled start is at least the
/// configured cutoff away from `now` (exactly the cutoff passes).
pub fn cancel_appointment(
    conn: &Connection,
    config: &SchedulingConfig,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
    reason: Option<&str>,
) -> Result<Appointment, SchedulingError> {
    apply_transition(conn, caller, id, now, &CANCEL, |appt| {
        if appt.scheduled_start() - now < config.cancellation_cutoff() {
            return Err(SchedulingError::PreconditionFailed(format!(
                "Appointments can only be cancelled at least {} hours before they start",
                config.cancellation_cutoff_hours
            )));
        }
        appt.cancel_reason =
            Some(non_blank(reason).unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string()));
        Ok(())
    })
}

pub fn complete_appointment(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
) -> Result<Appointment, SchedulingError> {
    apply_transition(conn, caller, id, now, &COMPLETE, |_| Ok(()))
}

pub fn mark_no_show(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
) -> Result<Appointment, SchedulingError> {
    apply_transition(conn, caller, id, now, &NO_SHOW, |_| Ok(()))
}

// ═══════════════════════════════════════════════════════════
// Admin paths
// ═══════════════════════════════════════════════════════════

/// Admin field edit. Moving the doctor, the nurse, the date or the interval
/// re-runs the conflict check with the appointment itself excluded.
pub fn update_appointment(
    conn: &Connection,
    config: &SchedulingConfig,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
    update: &AppointmentUpdate,
) -> Result<Appointment, SchedulingError> {
    let tx = begin_immediate(conn)?;
    let mut appt = load(&tx, id)?;
    authorize(caller, Action::UpdateAppointment, &Parties::of_appointment(&appt))?;

    if let Some(patient_id) = update.patient_id {
        appt.patient_id = resolve_patient(&tx, &patient_id)?.id;
    }
    if let Some(doctor_id) = update.doctor_id {
        appt.doctor_id = resolve_doctor(&tx, &doctor_id)?.id;
    }
    match update.nurse_id {
        Some(Some(nurse_id)) => appt.nurse_id = Some(resolve_nurse(&tx, &nurse_id)?.id),
        Some(None) => appt.nurse_id = None,
        None => {}
    }
    if let Some(date) = update.date {
        appt.date = date;
    }
    if let Some(raw) = &update.start_time {
        appt.start_time = parse_time_field("start_time", raw)?;
    }
    if let Some(raw) = &update.end_time {
        appt.end_time = parse_time_field("end_time", raw)?;
    }
    ensure_ordered(appt.start_time, appt.end_time)?;

    if let Some(reason) = &update.reason {
        appt.reason = non_blank(Some(reason.as_str()));
    }
    if let Some(notes) = &update.notes {
        appt.notes = non_blank(Some(notes.as_str()));
    }
    if let Some(link) = &update.virtual_meeting_link {
        appt.virtual_meeting_link = non_blank(Some(link.as_str()));
    }
    if let Some(first) = update.is_first_visit {
        appt.is_first_visit = first;
    }
    if let Some(is_virtual) = update.is_virtual {
        appt.is_virtual = is_virtual;
    }

    if update.reschedules() {
        ensure_caregivers_free(&tx, &appt, Some(&appt.id), config)?;
    }

    appt.updated_at = now;
    db::update_appointment(&tx, &appt)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appt.id,
        rescheduled = update.reschedules(),
        "Appointment updated"
    );
    Ok(appt)
}

/// Set any status regardless of the state machine. Admin only; the reason and
/// the previous status are kept in the audit trail.
///
/// Reopening a REJECTED or CANCELLED appointment re-runs the conflict check,
/// since its slot may have been released and rebooked meanwhile.
pub fn force_transition(
    conn: &Connection,
    config: &SchedulingConfig,
    now: NaiveDateTime,
    caller: &Caller,
    id: &Uuid,
    to: AppointmentStatus,
    reason: &str,
) -> Result<Appointment, SchedulingError> {
    let reason = non_blank(Some(reason)).ok_or_else(|| {
        SchedulingError::InvalidArgument("A reason is required to force a status".into())
    })?;

    let tx = begin_immediate(conn)?;
    let mut appt = load(&tx, id)?;
    authorize(caller, Action::ForceTransition, &Parties::of_appointment(&appt))?;
    if appt.status == to {
        return Err(SchedulingError::PreconditionFailed(format!(
            "Appointment is already {to}"
        )));
    }
    if appt.status.is_closed() && !to.is_closed() {
        ensure_caregivers_free(&tx, &appt, Some(&appt.id), config)?;
    }

    let entry = AppointmentAuditEntry {
        id: 0,
        appointment_id: appt.id,
        from_status: appt.status,
        to_status: to,
        actor_id: caller.profile_id,
        reason,
        recorded_at: now,
    };
    db::insert_audit_entry(&tx, &entry)?;

    appt.status = to;
    appt.updated_at = now;
    db::update_appointment(&tx, &appt)?;
    tx.commit()?;

    tracing::warn!(
        appointment_id = %appt.id,
        from = %entry.from_status,
        to = %to,
        actor = %caller.profile_id,
        "Appointment status forced"
    );
    Ok(appt)
}

/// Forced status changes of one appointment, oldest first.
pub fn audit_trail(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<Vec<AppointmentAuditEntry>, SchedulingError> {
    let appt = load(conn, id)?;
    authorize(caller, Action::ReadAppointment, &Parties::of_appointment(&appt))?;
    Ok(db::list_audit_entries(conn, id)?)
}

/// Hard delete. Refused while clinical records still point at the appointment.
pub fn delete_appointment(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<(), SchedulingError> {
    let tx = begin_immediate(conn)?;
    let appt = load(&tx, id)?;
    authorize(caller, Action::DeleteAppointment, &Parties::of_appointment(&appt))?;

    let records = db::count_records_for_appointment(&tx, id)?;
    if records > 0 {
        return Err(SchedulingError::PreconditionFailed(format!(
            "Appointment has {records} clinical record(s) and cannot be deleted"
        )));
    }
    db::delete_appointment(&tx, id).map_err(|err| {
        if err.is_foreign_key_violation() {
            SchedulingError::PreconditionFailed(
                "Appointment is still referenced by clinical records".into(),
            )
        } else {
            err.into()
        }
    })?;
    tx.commit()?;

    tracing::info!(appointment_id = %id, actor = %caller.profile_id, "Appointment deleted");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════════════════════

/// Lookup by id with no access check. This is what the record gateway resolves against.
pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Appointment, SchedulingError> {
    load(conn, id)
}

pub fn appointment_details(
    conn: &Connection,
    id: &Uuid,
) -> Result<AppointmentDetails, SchedulingError> {
    db::get_appointment_details(conn, id)?
        .ok_or_else(|| SchedulingError::not_found("Appointment", id))
}

/// Lookup by id on behalf of a caller: `Forbidden` if they may not see it.
pub fn find_appointment(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<AppointmentDetails, SchedulingError> {
    let details = appointment_details(conn, id)?;
    if !can_view_appointment(caller, &details.appointment) {
        return Err(SchedulingError::Forbidden(
            "You are not allowed to view this appointment".into(),
        ));
    }
    Ok(details)
}

fn list_scoped(
    conn: &Connection,
    caller: &Caller,
    scope: AppointmentScope,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let details = db::list_appointment_details(conn, scope)?;
    Ok(filter_visible(caller, details))
}

pub fn list_by_patient(
    conn: &Connection,
    caller: &Caller,
    patient_id: &Uuid,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    list_scoped(conn, caller, AppointmentScope::Patient(*patient_id))
}

pub fn list_by_doctor(
    conn: &Connection,
    caller: &Caller,
    doctor_id: &Uuid,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    list_scoped(conn, caller, AppointmentScope::Doctor(*doctor_id))
}

pub fn list_by_nurse(
    conn: &Connection,
    caller: &Caller,
    nurse_id: &Uuid,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    list_scoped(conn, caller, AppointmentScope::Nurse(*nurse_id))
}

/// Every appointment the caller may see.
pub fn list_visible(
    conn: &Connection,
    caller: &Caller,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    list_scoped(conn, caller, AppointmentScope::All)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
