//! Downstream Record Gateway: diagnoses, lab reports and prescriptions.
//!
//! A record can only be created against an appointment that resolves and is
//! not closed. Patient and doctor are copied from that appointment, and the
//! appointment reference only changes through [`reassign_record`].
//! Completed lab reports and fulfilled prescriptions cannot be deleted.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use super::validation::non_blank;
use super::workflow::get_appointment;
use super::SchedulingError;
use crate::authorization::{authorize, Action, Caller, Parties};
use crate::db::{self, begin_immediate};
use crate::models::enums::{LabReportStatus, PrescriptionStatus};
use crate::models::*;

fn required(field: &str, value: &str) -> Result<String, SchedulingError> {
    non_blank(Some(value))
        .ok_or_else(|| SchedulingError::InvalidArgument(format!("{field} is required")))
}

fn record_parties(patient_id: Uuid, doctor_id: Uuid) -> Parties {
    Parties {
        patient_id: Some(patient_id),
        doctor_id: Some(doctor_id),
        caregiver_id: None,
    }
}

/// Resolve the appointment a new record will hang off and check the caller
/// may attach `action` records to it.
fn resolve_target(
    conn: &Connection,
    caller: &Caller,
    action: Action,
    appointment_id: &Uuid,
) -> Result<Appointment, SchedulingError> {
    let appt = get_appointment(conn, appointment_id)?;
    authorize(caller, action, &Parties::of_appointment(&appt))?;
    if appt.status.is_closed() {
        return Err(SchedulingError::PreconditionFailed(format!(
            "Cannot attach clinical records to a {} appointment",
            appt.status
        )));
    }
    Ok(appt)
}

/// Parties of an existing record and whether its state protects it from deletion.
struct RecordHeader {
    parties: Parties,
    locked: bool,
}

fn record_header(
    conn: &Connection,
    kind: RecordKind,
    id: &Uuid,
) -> Result<RecordHeader, SchedulingError> {
    let missing = || SchedulingError::not_found(kind.label(), id);
    let header = match kind {
        RecordKind::Diagnosis => {
            let d = db::get_diagnosis(conn, id)?.ok_or_else(missing)?;
            RecordHeader {
                parties: record_parties(d.patient_id, d.doctor_id),
                locked: false,
            }
        }
        RecordKind::LabReport => {
            let r = db::get_lab_report(conn, id)?.ok_or_else(missing)?;
            RecordHeader {
                parties: record_parties(r.patient_id, r.doctor_id),
                locked: r.status == LabReportStatus::Completed,
            }
        }
        RecordKind::Prescription => {
            let p = db::get_prescription(conn, id)?.ok_or_else(missing)?;
            RecordHeader {
                parties: record_parties(p.patient_id, p.doctor_id),
                locked: p.status == PrescriptionStatus::Fulfilled,
            }
        }
    };
    Ok(header)
}

fn ensure_readable(
    caller: &Caller,
    patient_id: Uuid,
    doctor_id: Uuid,
) -> Result<(), SchedulingError> {
    authorize(caller, Action::ReadAppointment, &record_parties(patient_id, doctor_id))
}

// ═══════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════

pub fn create_diagnosis(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    request: &NewDiagnosis,
) -> Result<Diagnosis, SchedulingError> {
    let description = required("description", &request.description)?;
    let tx = begin_immediate(conn)?;
    let appt = resolve_target(&tx, caller, Action::CreateDiagnosis, &request.appointment_id)?;

    let diagnosis = Diagnosis {
        id: Uuid::new_v4(),
        appointment_id: appt.id,
        patient_id: appt.patient_id,
        doctor_id: appt.doctor_id,
        description,
        created_at: now,
    };
    db::insert_diagnosis(&tx, &diagnosis)?;
    tx.commit()?;

    tracing::info!(
        record_id = %diagnosis.id,
        appointment_id = %appt.id,
        "Diagnosis recorded"
    );
    Ok(diagnosis)
}

pub fn create_lab_report(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    request: &NewLabReport,
) -> Result<LabReport, SchedulingError> {
    let test_name = required("test_name", &request.test_name)?;
    let tx = begin_immediate(conn)?;
    let appt = resolve_target(&tx, caller, Action::CreateLabReport, &request.appointment_id)?;

    let report = LabReport {
        id: Uuid::new_v4(),
        appointment_id: appt.id,
        patient_id: appt.patient_id,
        doctor_id: appt.doctor_id,
        test_name,
        result: None,
        status: LabReportStatus::Pending,
        created_at: now,
    };
    db::insert_lab_report(&tx, &report)?;
    tx.commit()?;

    tracing::info!(record_id = %report.id, appointment_id = %appt.id, "Lab report ordered");
    Ok(report)
}

pub fn create_prescription(
    conn: &Connection,
    now: NaiveDateTime,
    caller: &Caller,
    request: &NewPrescription,
) -> Result<Prescription, SchedulingError> {
    let medication = required("medication", &request.medication)?;
    let dosage = required("dosage", &request.dosage)?;
    let tx = begin_immediate(conn)?;
    let appt =
        resolve_target(&tx, caller, Action::CreatePrescription, &request.appointment_id)?;

    let prescription = Prescription {
        id: Uuid::new_v4(),
        appointment_id: appt.id,
        patient_id: appt.patient_id,
        doctor_id: appt.doctor_id,
        medication,
        dosage,
        instructions: non_blank(request.instructions.as_deref()),
        status: PrescriptionStatus::Active,
        created_at: now,
    };
    db::insert_prescription(&tx, &prescription)?;
    tx.commit()?;

    tracing::info!(
        record_id = %prescription.id,
        appointment_id = %appt.id,
        "Prescription issued"
    );
    Ok(prescription)
}

// ═══════════════════════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════════════════════

pub fn get_diagnosis(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<Diagnosis, SchedulingError> {
    let d = db::get_diagnosis(conn, id)?
        .ok_or_else(|| SchedulingError::not_found(RecordKind::Diagnosis.label(), id))?;
    ensure_readable(caller, d.patient_id, d.doctor_id)?;
    Ok(d)
}

pub fn get_lab_report(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<LabReport, SchedulingError> {
    let r = db::get_lab_report(conn, id)?
        .ok_or_else(|| SchedulingError::not_found(RecordKind::LabReport.label(), id))?;
    ensure_readable(caller, r.patient_id, r.doctor_id)?;
    Ok(r)
}

pub fn get_prescription(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<Prescription, SchedulingError> {
    let p = db::get_prescription(conn, id)?
        .ok_or_else(|| SchedulingError::not_found(RecordKind::Prescription.label(), id))?;
    ensure_readable(caller, p.patient_id, p.doctor_id)?;
    Ok(p)
}

/// All records of one appointment, for anyone allowed to see the appointment.
pub fn list_records(
    conn: &Connection,
    caller: &Caller,
    appointment_id: &Uuid,
) -> Result<ClinicalRecords, SchedulingError> {
    let appt = get_appointment(conn, appointment_id)?;
    authorize(caller, Action::ReadAppointment, &Parties::of_appointment(&appt))?;

    Ok(ClinicalRecords {
        diagnoses: db::list_diagnoses_by_appointment(conn, appointment_id)?,
        lab_reports: db::list_lab_reports_by_appointment(conn, appointment_id)?,
        prescriptions: db::list_prescriptions_by_appointment(conn, appointment_id)?,
    })
}

// ═══════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════

/// Move a record to another appointment, re-copying patient and doctor from it.
///
/// A doctor must be assigned to both the current and the new appointment.
pub fn reassign_record(
    conn: &Connection,
    caller: &Caller,
    kind: RecordKind,
    id: &Uuid,
    appointment_id: &Uuid,
) -> Result<(), SchedulingError> {
    let tx = begin_immediate(conn)?;
    let header = record_header(&tx, kind, id)?;
    authorize(caller, Action::ReassignClinicalRecord, &header.parties)?;
    let target = resolve_target(&tx, caller, Action::ReassignClinicalRecord, appointment_id)?;

    db::repoint_record(&tx, kind, id, &target)?;
    tx.commit()?;

    tracing::info!(
        record_id = %id,
        kind = kind.label(),
        appointment_id = %target.id,
        "Clinical record reassigned"
    );
    Ok(())
}

pub fn complete_lab_report(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
    result: &str,
) -> Result<LabReport, SchedulingError> {
    let result = required("result", result)?;

    let tx = begin_immediate(conn)?;
    let mut report = db::get_lab_report(&tx, id)?
        .ok_or_else(|| SchedulingError::not_found(RecordKind::LabReport.label(), id))?;
    let parties = record_parties(report.patient_id, report.doctor_id);
    authorize(caller, Action::CompleteLabReport, &parties)?;
    if report.status == LabReportStatus::Completed {
        return Err(SchedulingError::PreconditionFailed(
            "Lab report is already completed".into(),
        ));
    }

    db::complete_lab_report_row(&tx, id, &result)?;
    tx.commit()?;

    report.result = Some(result);
    report.status = LabReportStatus::Completed;
    tracing::info!(record_id = %id, "Lab report completed");
    Ok(report)
}

pub fn fulfill_prescription(
    conn: &Connection,
    caller: &Caller,
    id: &Uuid,
) -> Result<Prescription, SchedulingError> {
    let tx = begin_immediate(conn)?;
    let mut prescription = db::get_prescription(&tx, id)?
        .ok_or_else(|| SchedulingError::not_found(RecordKind::Prescription.label(), id))?;
    authorize(
        caller,
        Action::FulfillPrescription,
        &record_parties(prescription.patient_id, prescription.doctor_id),
    )?;
    if prescription.status == PrescriptionStatus::Fulfilled {
        return Err(SchedulingError::PreconditionFailed(
            "Prescription is already fulfilled".into(),
        ));
    }

    db::fulfill_prescription_row(&tx, id)?;
    tx.commit()?;

    prescription.status = PrescriptionStatus::Fulfilled;
    tracing::info!(record_id = %id, "Prescription fulfilled");
    Ok(prescription)
}

/// Delete a record unless its state protects it.
pub fn delete_record(
    conn: &Connection,
    caller: &Caller,
    kind: RecordKind,
    id: &Uuid,
) -> Result<(), SchedulingError> {
    let tx = begin_immediate(conn)?;
    let header = record_header(&tx, kind, id)?;
    authorize(caller, Action::DeleteClinicalRecord, &header.parties)?;
    if header.locked {
        return Err(SchedulingError::PreconditionFailed(match kind {
            RecordKind::LabReport => "Completed lab reports cannot be deleted".into(),
            RecordKind::Prescription => "Fulfilled prescriptions cannot be deleted".into(),
            RecordKind::Diagnosis => format!("{} cannot be deleted", kind.label()),
        }));
    }

    db::delete_record(&tx, kind, id)?;
    tx.commit()?;

    tracing::info!(record_id = %id, kind = kind.label(), "Clinical record deleted");
    Ok(())
}
