use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_timestamp, not_found, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

fn record_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Diagnosis => "diagnoses",
        RecordKind::LabReport => "lab_reports",
        RecordKind::Prescription => "prescriptions",
    }
}

// ── Diagnoses ────────────────────────────────────────────

pub fn insert_diagnosis(conn: &Connection, diag: &Diagnosis) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (id, appointment_id, patient_id, doctor_id, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            diag.id.to_string(),
            diag.appointment_id.to_string(),
            diag.patient_id.to_string(),
            diag.doctor_id.to_string(),
            diag.description,
            format_timestamp(&diag.created_at),
        ],
    )?;
    Ok(())
}

type DiagnosisRow = (String, String, String, String, String, String);

fn read_diagnosis_row(row: &Row<'_>) -> rusqlite::Result<DiagnosisRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn diagnosis_from_row(row: DiagnosisRow) -> Result<Diagnosis, DatabaseError> {
    let (id, appt, patient, doctor, description, created_at) = row;
    Ok(Diagnosis {
        id: parse_uuid(&id)?,
        appointment_id: parse_uuid(&appt)?,
        patient_id: parse_uuid(&patient)?,
        doctor_id: parse_uuid(&doctor)?,
        description,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub fn get_diagnosis(conn: &Connection, id: &Uuid) -> Result<Option<Diagnosis>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, appointment_id, patient_id, doctor_id, description, created_at
             FROM diagnoses WHERE id = ?1",
            params![id.to_string()],
            read_diagnosis_row,
        )
        .optional()?;
    row.map(diagnosis_from_row).transpose()
}

pub fn list_diagnoses_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<Diagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, doctor_id, description, created_at
         FROM diagnoses WHERE appointment_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], read_diagnosis_row)?;

    let mut diagnoses = Vec::new();
    for row in rows {
        diagnoses.push(diagnosis_from_row(row?)?);
    }
    Ok(diagnoses)
}

// ── Lab reports ──────────────────────────────────────────

pub fn insert_lab_report(conn: &Connection, report: &LabReport) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_reports (id, appointment_id, patient_id, doctor_id, test_name, result,
         status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            report.id.to_string(),
            report.appointment_id.to_string(),
            report.patient_id.to_string(),
            report.doctor_id.to_string(),
            report.test_name,
            report.result,
            report.status.as_str(),
            format_timestamp(&report.created_at),
        ],
    )?;
    Ok(())
}

type LabReportRow = (String, String, String, String, String, Option<String>, String, String);

fn read_lab_report_row(row: &Row<'_>) -> rusqlite::Result<LabReportRow> {
    Ok((
        row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?,
        row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?,
    ))
}

fn lab_report_from_row(row: LabReportRow) -> Result<LabReport, DatabaseError> {
    let (id, appt, patient, doctor, test_name, result, status, created_at) = row;
    Ok(LabReport {
        id: parse_uuid(&id)?,
        appointment_id: parse_uuid(&appt)?,
        patient_id: parse_uuid(&patient)?,
        doctor_id: parse_uuid(&doctor)?,
        test_name,
        result,
        status: LabReportStatus::from_str(&status)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub fn get_lab_report(conn: &Connection, id: &Uuid) -> Result<Option<LabReport>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, appointment_id, patient_id, doctor_id, test_name, result, status, created_at
             FROM lab_reports WHERE id = ?1",
            params![id.to_string()],
            read_lab_report_row,
        )
        .optional()?;
    row.map(lab_report_from_row).transpose()
}

pub fn list_lab_reports_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<LabReport>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, doctor_id, test_name, result, status, created_at
         FROM lab_reports WHERE appointment_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], read_lab_report_row)?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(lab_report_from_row(row?)?);
    }
    Ok(reports)
}

pub fn complete_lab_report_row(
    conn: &Connection,
    id: &Uuid,
    result: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE lab_reports SET result = ?2, status = 'COMPLETED' WHERE id = ?1",
        params![id.to_string(), result],
    )?;
    if changed == 0 {
        return Err(not_found("LabReport", id));
    }
    Ok(())
}

// ── Prescriptions ────────────────────────────────────────

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, appointment_id, patient_id, doctor_id, medication, dosage,
         instructions, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            rx.id.to_string(),
            rx.appointment_id.to_string(),
            rx.patient_id.to_string(),
            rx.doctor_id.to_string(),
            rx.medication,
            rx.dosage,
            rx.instructions,
            rx.status.as_str(),
            format_timestamp(&rx.created_at),
        ],
    )?;
    Ok(())
}

type PrescriptionRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

fn read_prescription_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok((
        row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?,
        row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?,
    ))
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    let (id, appt, patient, doctor, medication, dosage, instructions, status, created_at) = row;
    Ok(Prescription {
        id: parse_uuid(&id)?,
        appointment_id: parse_uuid(&appt)?,
        patient_id: parse_uuid(&patient)?,
        doctor_id: parse_uuid(&doctor)?,
        medication,
        dosage,
        instructions,
        status: PrescriptionStatus::from_str(&status)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, appointment_id, patient_id, doctor_id, medication, dosage, instructions,
             status, created_at FROM prescriptions WHERE id = ?1",
            params![id.to_string()],
            read_prescription_row,
        )
        .optional()?;
    row.map(prescription_from_row).transpose()
}

pub fn list_prescriptions_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, patient_id, doctor_id, medication, dosage, instructions,
         status, created_at FROM prescriptions WHERE appointment_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], read_prescription_row)?;

    let mut prescriptions = Vec::new();
    for row in rows {
        prescriptions.push(prescription_from_row(row?)?);
    }
    Ok(prescriptions)
}

pub fn fulfill_prescription_row(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET status = 'FULFILLED' WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found("Prescription", id));
    }
    Ok(())
}

// ── Shared ───────────────────────────────────────────────

/// Point a record at another appointment, copying that appointment's parties.
pub fn repoint_record(
    conn: &Connection,
    kind: RecordKind,
    id: &Uuid,
    appointment: &Appointment,
) -> Result<(), DatabaseError> {
    let table = record_table(kind);
    let changed = conn.execute(
        &format!(
            "UPDATE {table} SET appointment_id = ?2, patient_id = ?3, doctor_id = ?4 WHERE id = ?1"
        ),
        params![
            id.to_string(),
            appointment.id.to_string(),
            appointment.patient_id.to_string(),
            appointment.doctor_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(not_found(kind.label(), id));
    }
    Ok(())
}

pub fn delete_record(conn: &Connection, kind: RecordKind, id: &Uuid) -> Result<(), DatabaseError> {
    let table = record_table(kind);
    let deleted = conn.execute(
        &format!("DELETE FROM {table} WHERE id = ?1"),
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(not_found(kind.label(), id));
    }
    Ok(())
}

/// Number of clinical records of any kind referencing an appointment.
pub fn count_records_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM diagnoses WHERE appointment_id = ?1)
              + (SELECT COUNT(*) FROM lab_reports WHERE appointment_id = ?1)
              + (SELECT COUNT(*) FROM prescriptions WHERE appointment_id = ?1)",
        params![appointment_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}
