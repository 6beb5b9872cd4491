use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    format_timestamp, not_found, parse_date, parse_opt_uuid, parse_time, parse_timestamp,
    parse_uuid,
};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::time::format_hhmm;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "a.id, a.patient_id, a.doctor_id, a.nurse_id, a.date,
     a.start_time, a.end_time, a.status, a.reason, a.notes, a.rejection_reason,
     a.cancel_reason, a.is_first_visit, a.is_virtual, a.virtual_meeting_link,
     a.reminder_sent_at, a.created_at, a.updated_at";

const APPOINTMENT_COLUMN_COUNT: usize = 18;

/// Raw column values, decoded into an `Appointment` outside the rusqlite closure
/// so enum and uuid failures surface as `DatabaseError`.
struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    nurse_id: Option<String>,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    reason: Option<String>,
    notes: Option<String>,
    rejection_reason: Option<String>,
    cancel_reason: Option<String>,
    is_first_visit: bool,
    is_virtual: bool,
    virtual_meeting_link: Option<String>,
    reminder_sent_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            doctor_id: row.get(2)?,
            nurse_id: row.get(3)?,
            date: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            status: row.get(7)?,
            reason: row.get(8)?,
            notes: row.get(9)?,
            rejection_reason: row.get(10)?,
            cancel_reason: row.get(11)?,
            is_first_visit: row.get::<_, i32>(12)? != 0,
            is_virtual: row.get::<_, i32>(13)? != 0,
            virtual_meeting_link: row.get(14)?,
            reminder_sent_at: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DatabaseError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: parse_uuid(&row.id)?,
            patient_id: parse_uuid(&row.patient_id)?,
            doctor_id: parse_uuid(&row.doctor_id)?,
            nurse_id: parse_opt_uuid(row.nurse_id)?,
            date: parse_date(&row.date)?,
            start_time: parse_time(&row.start_time)?,
            end_time: parse_time(&row.end_time)?,
            status: AppointmentStatus::from_str(&row.status)?,
            reason: row.reason,
            notes: row.notes,
            rejection_reason: row.rejection_reason,
            cancel_reason: row.cancel_reason,
            is_first_visit: row.is_first_visit,
            is_virtual: row.is_virtual,
            virtual_meeting_link: row.virtual_meeting_link,
            reminder_sent_at: row
                .reminder_sent_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, nurse_id, date, start_time, end_time,
         status, reason, notes, rejection_reason, cancel_reason, is_first_visit, is_virtual,
         virtual_meeting_link, reminder_sent_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.nurse_id.map(|id| id.to_string()),
            appt.date.to_string(),
            format_hhmm(&appt.start_time),
            format_hhmm(&appt.end_time),
            appt.status.as_str(),
            appt.reason,
            appt.notes,
            appt.rejection_reason,
            appt.cancel_reason,
            appt.is_first_visit as i32,
            appt.is_virtual as i32,
            appt.virtual_meeting_link,
            appt.reminder_sent_at.as_ref().map(format_timestamp),
            format_timestamp(&appt.created_at),
            format_timestamp(&appt.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing appointment.
pub fn update_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET patient_id = ?2, doctor_id = ?3, nurse_id = ?4, date = ?5,
         start_time = ?6, end_time = ?7, status = ?8, reason = ?9, notes = ?10,
         rejection_reason = ?11, cancel_reason = ?12, is_first_visit = ?13, is_virtual = ?14,
         virtual_meeting_link = ?15, reminder_sent_at = ?16, updated_at = ?17
         WHERE id = ?1",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.nurse_id.map(|id| id.to_string()),
            appt.date.to_string(),
            format_hhmm(&appt.start_time),
            format_hhmm(&appt.end_time),
            appt.status.as_str(),
            appt.reason,
            appt.notes,
            appt.rejection_reason,
            appt.cancel_reason,
            appt.is_first_visit as i32,
            appt.is_virtual as i32,
            appt.virtual_meeting_link,
            appt.reminder_sent_at.as_ref().map(format_timestamp),
            format_timestamp(&appt.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(not_found("Appointment", &appt.id));
    }
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], AppointmentRow::read)
        .optional()?;
    row.map(Appointment::try_from).transpose()
}

pub fn delete_appointment(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM appointments WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(not_found("Appointment", id));
    }
    Ok(())
}

pub fn set_reminder_sent(
    conn: &Connection,
    id: &Uuid,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET reminder_sent_at = ?2, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), format_timestamp(at)],
    )?;
    if changed == 0 {
        return Err(not_found("Appointment", id));
    }
    Ok(())
}

/// Every appointment of one caregiver on one calendar day, ordered by start.
pub fn list_caregiver_appointments_on(
    conn: &Connection,
    kind: CaregiverKind,
    caregiver_id: &Uuid,
    date: &NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    let column = match kind {
        CaregiverKind::Doctor => "doctor_id",
        CaregiverKind::Nurse => "nurse_id",
    };
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.{column} = ?1 AND a.date = ?2
         ORDER BY a.start_time ASC"
    );
    query_appointments(conn, &sql, params![caregiver_id.to_string(), date.to_string()])
}

/// APPROVED appointments dated within `[from, to]` that have no reminder yet.
pub fn list_unreminded_approved_between(
    conn: &Connection,
    from: &NaiveDate,
    to: &NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.status = 'APPROVED' AND a.reminder_sent_at IS NULL
           AND a.date BETWEEN ?1 AND ?2
         ORDER BY a.date ASC, a.start_time ASC"
    );
    query_appointments(conn, &sql, params![from.to_string(), to.to_string()])
}

fn query_appointments(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, AppointmentRow::read)?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(Appointment::try_from(row?)?);
    }
    Ok(appointments)
}

// ── Resolved views ───────────────────────────────────────

/// Party filter for resolved appointment listings.
#[derive(Debug, Clone, Copy)]
pub enum AppointmentScope {
    All,
    Patient(Uuid),
    Doctor(Uuid),
    Nurse(Uuid),
}

const DETAILS_JOIN: &str = "FROM appointments a
     JOIN patients p ON p.id = a.patient_id
     JOIN doctors d ON d.id = a.doctor_id
     LEFT JOIN nurses n ON n.id = a.nurse_id";

/// Appointments in scope with patient, doctor and nurse resolved, ordered by date then start.
pub fn list_appointment_details(
    conn: &Connection,
    scope: AppointmentScope,
) -> Result<Vec<AppointmentDetails>, DatabaseError> {
    let (filter, party) = match scope {
        AppointmentScope::All => ("", None),
        AppointmentScope::Patient(id) => ("WHERE a.patient_id = ?1", Some(id)),
        AppointmentScope::Doctor(id) => ("WHERE a.doctor_id = ?1", Some(id)),
        AppointmentScope::Nurse(id) => ("WHERE a.nurse_id = ?1", Some(id)),
    };
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, p.name, d.name, d.specialty, n.name
         {DETAILS_JOIN} {filter}
         ORDER BY a.date ASC, a.start_time ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = match party {
        Some(id) => stmt.query_map(params![id.to_string()], read_details_row)?,
        None => stmt.query_map([], read_details_row)?,
    };

    let mut details = Vec::new();
    for row in rows {
        details.push(details_from_row(row?)?);
    }
    Ok(details)
}

pub fn get_appointment_details(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<AppointmentDetails>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, p.name, d.name, d.specialty, n.name
         {DETAILS_JOIN} WHERE a.id = ?1"
    );
    let row = conn
        .query_row(&sql, params![id.to_string()], read_details_row)
        .optional()?;
    row.map(details_from_row).transpose()
}

type DetailsRow = (AppointmentRow, String, String, Option<String>, Option<String>);

fn read_details_row(row: &Row<'_>) -> rusqlite::Result<DetailsRow> {
    let base = APPOINTMENT_COLUMN_COUNT;
    Ok((
        AppointmentRow::read(row)?,
        row.get(base)?,
        row.get(base + 1)?,
        row.get(base + 2)?,
        row.get(base + 3)?,
    ))
}

fn details_from_row(
    (row, patient_name, doctor_name, specialty, nurse_name): DetailsRow,
) -> Result<AppointmentDetails, DatabaseError> {
    let appointment = Appointment::try_from(row)?;
    let nurse = match (appointment.nurse_id, nurse_name) {
        (Some(id), Some(name)) => Some(Nurse { id, name }),
        _ => None,
    };
    Ok(AppointmentDetails {
        patient: Patient {
            id: appointment.patient_id,
            name: patient_name,
        },
        doctor: Doctor {
            id: appointment.doctor_id,
            name: doctor_name,
            specialty,
        },
        nurse,
        appointment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::repository::{insert_doctor, insert_nurse, insert_patient};
    use chrono::NaiveTime;

    struct Fixture {
        conn: Connection,
        patient: Uuid,
        doctor: Uuid,
        nurse: Uuid,
    }

    fn setup() -> Fixture {
        let conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let nurse = Uuid::new_v4();
        let pat = Patient {
            id: patient,
            name: "Pat".into(),
        };
        insert_patient(&conn, &pat).unwrap();
        let gp = Doctor {
            id: doctor,
            name: "Dr. Chen".into(),
            specialty: Some("GP".into()),
        };
        insert_doctor(&conn, &gp).unwrap();
        let sam = Nurse {
            id: nurse,
            name: "Sam".into(),
        };
        insert_nurse(&conn, &sam).unwrap();
        Fixture {
            conn,
            patient,
            doctor,
            nurse,
        }
    }

    fn sample(f: &Fixture, date: NaiveDate, start: (u32, u32), end: (u32, u32)) -> Appointment {
        let created = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: f.patient,
            doctor_id: f.doctor,
            nurse_id: None,
            date,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            status: AppointmentStatus::PendingApproval,
            reason: Some("Check-up".into()),
            notes: None,
            rejection_reason: None,
            cancel_reason: None,
            is_first_visit: true,
            is_virtual: false,
            virtual_meeting_link: None,
            reminder_sent_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn appointment_insert_and_retrieve() {
        let f = setup();
        let appt = sample(&f, june_first(), (9, 0), (9, 30));
        insert_appointment(&f.conn, &appt).unwrap();

        let loaded = get_appointment(&f.conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded, appt);
    }

    #[test]
    fn times_stored_as_hhmm() {
        let f = setup();
        let appt = sample(&f, june_first(), (9, 5), (9, 30));
        insert_appointment(&f.conn, &appt).unwrap();

        let start: String = f
            .conn
            .query_row("SELECT start_time FROM appointments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(start, "09:05");
    }

    #[test]
    fn update_missing_appointment_is_not_found() {
        let f = setup();
        let appt = sample(&f, june_first(), (9, 0), (9, 30));
        let err = update_appointment(&f.conn, &appt).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn start_before_end_enforced_by_schema() {
        let f = setup();
        let appt = sample(&f, june_first(), (10, 0), (9, 0));
        assert!(insert_appointment(&f.conn, &appt).is_err());
    }

    #[test]
    fn caregiver_day_listing_filters_date_and_role() {
        let f = setup();
        let mut with_nurse = sample(&f, june_first(), (11, 0), (11, 30));
        with_nurse.nurse_id = Some(f.nurse);
        insert_appointment(&f.conn, &with_nurse).unwrap();
        insert_appointment(&f.conn, &sample(&f, june_first(), (9, 0), (9, 30))).unwrap();
        let next_day = june_first().succ_opt().unwrap();
        insert_appointment(&f.conn, &sample(&f, next_day, (9, 0), (9, 30))).unwrap();

        let doctor_day =
            list_caregiver_appointments_on(&f.conn, CaregiverKind::Doctor, &f.doctor, &june_first())
                .unwrap();
        assert_eq!(doctor_day.len(), 2);
        assert!(doctor_day[0].start_time < doctor_day[1].start_time);

        let nurse_day =
            list_caregiver_appointments_on(&f.conn, CaregiverKind::Nurse, &f.nurse, &june_first())
                .unwrap();
        assert_eq!(nurse_day.len(), 1);
        assert_eq!(nurse_day[0].id, with_nurse.id);
    }

    #[test]
    fn details_resolve_parties() {
        let f = setup();
        let mut appt = sample(&f, june_first(), (9, 0), (9, 30));
        appt.nurse_id = Some(f.nurse);
        insert_appointment(&f.conn, &appt).unwrap();

        let details = get_appointment_details(&f.conn, &appt.id).unwrap().unwrap();
        assert_eq!(details.patient.name, "Pat");
        assert_eq!(details.doctor.name, "Dr. Chen");
        assert_eq!(details.nurse.unwrap().name, "Sam");

        let by_nurse = list_appointment_details(&f.conn, AppointmentScope::Nurse(f.nurse)).unwrap();
        assert_eq!(by_nurse.len(), 1);
        let stranger = AppointmentScope::Patient(Uuid::new_v4());
        let by_other = list_appointment_details(&f.conn, stranger).unwrap();
        assert!(by_other.is_empty());
    }

    #[test]
    fn delete_removes_row() {
        let f = setup();
        let appt = sample(&f, june_first(), (9, 0), (9, 30));
        insert_appointment(&f.conn, &appt).unwrap();
        delete_appointment(&f.conn, &appt.id).unwrap();
        assert!(get_appointment(&f.conn, &appt.id).unwrap().is_none());
        assert!(matches!(
            delete_appointment(&f.conn, &appt.id),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
