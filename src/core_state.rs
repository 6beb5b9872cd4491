//! Transport-agnostic application state.
//!
//! `CoreState` is the single synchronous entry point to the scheduling core.
//! It owns one SQLite connection behind a `Mutex`, so calls from any number
//! of threads are serialized in-process. Each check-then-write additionally
//! runs in a `BEGIN IMMEDIATE` transaction, which serializes separate
//! processes sharing the same database file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::Caller;
use crate::clock::{Clock, SystemClock};
use crate::config::{self, SchedulingConfig};
use crate::db;
use crate::models::enums::{AppointmentStatus, CaregiverKind};
use crate::models::*;
use crate::scheduling::validation::non_blank;
use crate::scheduling::{records, reminders, shifts, workflow, SchedulingError};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    conn: Mutex<Connection>,
    config: SchedulingConfig,
    clock: Arc<dyn Clock>,
    /// `None` for in-memory databases.
    db_path: Option<PathBuf>,
}

impl CoreState {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub fn open(path: &Path, config: SchedulingConfig) -> Result<Self, SchedulingError> {
        let conn = db::open_database(path)?;
        tracing::info!(path = %path.display(), "Scheduling database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            config,
            clock: Arc::new(SystemClock),
            db_path: Some(path.to_path_buf()),
        })
    }

    /// Database under the app data directory, configuration from the environment.
    pub fn open_default() -> Result<Self, SchedulingError> {
        Self::open(&config::database_path(), SchedulingConfig::from_env())
    }

    pub fn in_memory(config: SchedulingConfig) -> Result<Self, SchedulingError> {
        Ok(Self {
            conn: Mutex::new(db::open_memory_database()?),
            config,
            clock: Arc::new(SystemClock),
            db_path: None,
        })
    }

    /// Replace the wall clock used for "now".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Run `f` with exclusive use of the connection.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, SchedulingError>,
    ) -> Result<T, SchedulingError> {
        let conn = self.conn.lock().map_err(|_| SchedulingError::LockPoisoned)?;
        f(&conn)
    }

    // ── Directory ───────────────────────────────────────────

    pub fn register_patient(&self, name: &str) -> Result<Patient, SchedulingError> {
        let patient = Patient {
            id: Uuid::new_v4(),
            name: required_name(name)?,
        };
        self.with_conn(|conn| Ok(db::insert_patient(conn, &patient)?))?;
        tracing::info!(patient_id = %patient.id, "Patient registered");
        Ok(patient)
    }

    pub fn register_doctor(
        &self,
        name: &str,
        specialty: Option<&str>,
    ) -> Result<Doctor, SchedulingError> {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: required_name(name)?,
            specialty: non_blank(specialty),
        };
        self.with_conn(|conn| Ok(db::insert_doctor(conn, &doctor)?))?;
        tracing::info!(doctor_id = %doctor.id, "Doctor registered");
        Ok(doctor)
    }

    pub fn register_nurse(&self, name: &str) -> Result<Nurse, SchedulingError> {
        let nurse = Nurse {
            id: Uuid::new_v4(),
            name: required_name(name)?,
        };
        self.with_conn(|conn| Ok(db::insert_nurse(conn, &nurse)?))?;
        tracing::info!(nurse_id = %nurse.id, "Nurse registered");
        Ok(nurse)
    }

    pub fn get_patient(&self, id: &Uuid) -> Result<Patient, SchedulingError> {
        self.with_conn(|conn| {
            db::get_patient(conn, id)?.ok_or_else(|| SchedulingError::not_found("Patient", id))
        })
    }

    pub fn get_doctor(&self, id: &Uuid) -> Result<Doctor, SchedulingError> {
        self.with_conn(|conn| {
            db::get_doctor(conn, id)?.ok_or_else(|| SchedulingError::not_found("Doctor", id))
        })
    }

    pub fn get_nurse(&self, id: &Uuid) -> Result<Nurse, SchedulingError> {
        self.with_conn(|conn| {
            db::get_nurse(conn, id)?.ok_or_else(|| SchedulingError::not_found("Nurse", id))
        })
    }

    // ── Appointments ────────────────────────────────────────

    pub fn create_appointment(
        &self,
        caller: &Caller,
        request: &NewAppointment,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| {
            workflow::create_appointment(conn, &self.config, now, caller, request)
        })
    }

    pub fn approve_appointment(
        &self,
        caller: &Caller,
        id: &Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| workflow::approve_appointment(conn, now, caller, id))
    }

    pub fn reject_appointment(
        &self,
        caller: &Caller,
        id: &Uuid,
        reason: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| workflow::reject_appointment(conn, now, caller, id, reason))
    }

    pub fn cancel_appointment(
        &self,
        caller: &Caller,
        id: &Uuid,
        reason: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| {
            workflow::cancel_appointment(conn, &self.config, now, caller, id, reason)
        })
    }

    pub fn complete_appointment(
        &self,
        caller: &Caller,
        id: &Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| workflow::complete_appointment(conn, now, caller, id))
    }

    pub fn mark_no_show(&self, caller: &Caller, id: &Uuid) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| workflow::mark_no_show(conn, now, caller, id))
    }

    pub fn update_appointment(
        &self,
        caller: &Caller,
        id: &Uuid,
        update: &AppointmentUpdate,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| {
            workflow::update_appointment(conn, &self.config, now, caller, id, update)
        })
    }

    pub fn force_transition(
        &self,
        caller: &Caller,
        id: &Uuid,
        to: AppointmentStatus,
        reason: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| {
            workflow::force_transition(conn, &self.config, now, caller, id, to, reason)
        })
    }

    pub fn audit_trail(
        &self,
        caller: &Caller,
        id: &Uuid,
    ) -> Result<Vec<AppointmentAuditEntry>, SchedulingError> {
        self.with_conn(|conn| workflow::audit_trail(conn, caller, id))
    }

    pub fn delete_appointment(&self, caller: &Caller, id: &Uuid) -> Result<(), SchedulingError> {
        self.with_conn(|conn| workflow::delete_appointment(conn, caller, id))
    }

    pub fn get_appointment(&self, id: &Uuid) -> Result<Appointment, SchedulingError> {
        self.with_conn(|conn| workflow::get_appointment(conn, id))
    }

    pub fn appointment_details(&self, id: &Uuid) -> Result<AppointmentDetails, SchedulingError> {
        self.with_conn(|conn| workflow::appointment_details(conn, id))
    }

    pub fn find_appointment(
        &self,
        caller: &Caller,
        id: &Uuid,
    ) -> Result<AppointmentDetails, SchedulingError> {
        self.with_conn(|conn| workflow::find_appointment(conn, caller, id))
    }

    pub fn list_by_patient(
        &self,
        caller: &Caller,
        patient_id: &Uuid,
    ) -> Result<Vec<AppointmentDetails>, SchedulingError> {
        self.with_conn(|conn| workflow::list_by_patient(conn, caller, patient_id))
    }

    pub fn list_by_doctor(
        &self,
        caller: &Caller,
        doctor_id: &Uuid,
    ) -> Result<Vec<AppointmentDetails>, SchedulingError> {
        self.with_conn(|conn| workflow::list_by_doctor(conn, caller, doctor_id))
    }

    pub fn list_by_nurse(
        &self,
        caller: &Caller,
        nurse_id: &Uuid,
    ) -> Result<Vec<AppointmentDetails>, SchedulingError> {
        self.with_conn(|conn| workflow::list_by_nurse(conn, caller, nurse_id))
    }

    pub fn list_visible(
        &self,
        caller: &Caller,
    ) -> Result<Vec<AppointmentDetails>, SchedulingError> {
        self.with_conn(|conn| workflow::list_visible(conn, caller))
    }

    // ── Reminders ───────────────────────────────────────────

    pub fn due_reminders(&self, window: Duration) -> Result<Vec<Appointment>, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| reminders::due_reminders(conn, now, window))
    }

    pub fn mark_reminder_sent(&self, id: &Uuid) -> Result<(), SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| reminders::mark_reminder_sent(conn, now, id))
    }

    // ── Shifts ──────────────────────────────────────────────

    pub fn create_shift(
        &self,
        caller: &Caller,
        kind: CaregiverKind,
        request: &NewShiftSlot,
    ) -> Result<ShiftSlot, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| shifts::create_shift(conn, now, caller, kind, request))
    }

    pub fn get_shift(&self, kind: CaregiverKind, id: &Uuid) -> Result<ShiftSlot, SchedulingError> {
        self.with_conn(|conn| shifts::get_shift(conn, kind, id))
    }

    pub fn list_shifts(
        &self,
        kind: CaregiverKind,
        caregiver_id: &Uuid,
    ) -> Result<Vec<ShiftSlot>, SchedulingError> {
        self.with_conn(|conn| shifts::list_shifts(conn, kind, caregiver_id))
    }

    pub fn update_shift(
        &self,
        caller: &Caller,
        kind: CaregiverKind,
        id: &Uuid,
        update: &ShiftSlotUpdate,
    ) -> Result<ShiftSlot, SchedulingError> {
        self.with_conn(|conn| shifts::update_shift(conn, caller, kind, id, update))
    }

    pub fn delete_shift(
        &self,
        caller: &Caller,
        kind: CaregiverKind,
        id: &Uuid,
    ) -> Result<(), SchedulingError> {
        self.with_conn(|conn| shifts::delete_shift(conn, caller, kind, id))
    }

    // ── Clinical records ────────────────────────────────────

    pub fn create_diagnosis(
        &self,
        caller: &Caller,
        request: &NewDiagnosis,
    ) -> Result<Diagnosis, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| records::create_diagnosis(conn, now, caller, request))
    }

    pub fn create_lab_report(
        &self,
        caller: &Caller,
        request: &NewLabReport,
    ) -> Result<LabReport, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| records::create_lab_report(conn, now, caller, request))
    }

    pub fn create_prescription(
        &self,
        caller: &Caller,
        request: &NewPrescription,
    ) -> Result<Prescription, SchedulingError> {
        let now = self.now();
        self.with_conn(|conn| records::create_prescription(conn, now, caller, request))
    }

    pub fn get_diagnosis(&self, caller: &Caller, id: &Uuid) -> Result<Diagnosis, SchedulingError> {
        self.with_conn(|conn| records::get_diagnosis(conn, caller, id))
    }

    pub fn get_lab_report(&self, caller: &Caller, id: &Uuid) -> Result<LabReport, SchedulingError> {
        self.with_conn(|conn| records::get_lab_report(conn, caller, id))
    }

    pub fn get_prescription(
        &self,
        caller: &Caller,
        id: &Uuid,
    ) -> Result<Prescription, SchedulingError> {
        self.with_conn(|conn| records::get_prescription(conn, caller, id))
    }

    pub fn list_records(
        &self,
        caller: &Caller,
        appointment_id: &Uuid,
    ) -> Result<ClinicalRecords, SchedulingError> {
        self.with_conn(|conn| records::list_records(conn, caller, appointment_id))
    }

    pub fn reassign_record(
        &self,
        caller: &Caller,
        kind: RecordKind,
        id: &Uuid,
        appointment_id: &Uuid,
    ) -> Result<(), SchedulingError> {
        self.with_conn(|conn| records::reassign_record(conn, caller, kind, id, appointment_id))
    }

    pub fn complete_lab_report(
        &self,
        caller: &Caller,
        id: &Uuid,
        result: &str,
    ) -> Result<LabReport, SchedulingError> {
        self.with_conn(|conn| records::complete_lab_report(conn, caller, id, result))
    }

    pub fn fulfill_prescription(
        &self,
        caller: &Caller,
        id: &Uuid,
    ) -> Result<Prescription, SchedulingError> {
        self.with_conn(|conn| records::fulfill_prescription(conn, caller, id))
    }

    pub fn delete_record(
        &self,
        caller: &Caller,
        kind: RecordKind,
        id: &Uuid,
    ) -> Result<(), SchedulingError> {
        self.with_conn(|conn| records::delete_record(conn, caller, kind, id))
    }
}

fn required_name(name: &str) -> Result<String, SchedulingError> {
    non_blank(Some(name)).ok_or_else(|| SchedulingError::InvalidArgument("name is required".into()))
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use std::thread;

    fn start_of_may() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn booking(patient: Uuid, doctor: Uuid, start: &str, end: &str) -> NewAppointment {
        NewAppointment {
            patient_id: patient,
            doctor_id: doctor,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: start.into(),
            end_time: end.into(),
            ..Default::default()
        }
    }

    #[test]
    fn registration_validates_names() {
        let state = CoreState::in_memory(SchedulingConfig::default()).unwrap();
        assert!(matches!(state.register_patient("  "), Err(SchedulingError::InvalidArgument(_))));

        let doctor = state.register_doctor("Dr. Ana Silva", Some("")).unwrap();
        assert_eq!(doctor.specialty, None);
        assert_eq!(state.get_doctor(&doctor.id).unwrap(), doctor);
        assert!(matches!(state.get_nurse(&doctor.id), Err(SchedulingError::NotFound { .. })));
        assert!(state.db_path().is_none());
    }

    #[test]
    fn clock_drives_cancel_cutoff() {
        let clock = Arc::new(FixedClock::new(start_of_may()));
        let state = CoreState::in_memory(SchedulingConfig::default())
            .unwrap()
            .with_clock(clock.clone());
        let patient = state.register_patient("Pat").unwrap();
        let doctor = state.register_doctor("Dr. Chen", None).unwrap();
        let me = Caller::patient(patient.id);

        let appt = state
            .create_appointment(&me, &booking(patient.id, doctor.id, "09:00", "09:30"))
            .unwrap();
        assert_eq!(appt.created_at, start_of_may());

        clock.set(appt.scheduled_start() - Duration::hours(2));
        assert!(matches!(
            state.cancel_appointment(&me, &appt.id, None),
            Err(SchedulingError::PreconditionFailed(_))
        ));

        clock.set(appt.scheduled_start() - Duration::hours(48));
        let cancelled = state.cancel_appointment(&me, &appt.id, Some("moving away")).unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn full_visit_lifecycle() {
        let state = CoreState::in_memory(SchedulingConfig::default())
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(start_of_may())));
        let patient = state.register_patient("Pat").unwrap();
        let doctor = state.register_doctor("Dr. Chen", Some("Cardiology")).unwrap();
        let nurse = state.register_nurse("Sam").unwrap();
        let doc = Caller::doctor(doctor.id);

        let appt = state
            .create_appointment(
                &Caller::nurse(nurse.id),
                &NewAppointment {
                    nurse_id: Some(nurse.id),
                    ..booking(patient.id, doctor.id, "09:00", "09:30")
                },
            )
            .unwrap();
        state.approve_appointment(&doc, &appt.id).unwrap();
        state.complete_appointment(&doc, &appt.id).unwrap();

        let rx = state
            .create_prescription(&doc, &NewPrescription {
                appointment_id: appt.id,
                medication: "Atorvastatin".into(),
                dosage: "10mg".into(),
                instructions: Some("Once daily".into()),
            })
            .unwrap();
        let records = state.list_records(&Caller::patient(patient.id), &appt.id).unwrap();
        assert_eq!(records.prescriptions, vec![rx]);

        let details = state.find_appointment(&Caller::patient(patient.id), &appt.id).unwrap();
        assert_eq!(details.appointment.status, AppointmentStatus::Completed);
        assert_eq!(details.doctor.specialty.as_deref(), Some("Cardiology"));
        assert_eq!(state.list_by_nurse(&Caller::nurse(nurse.id), &nurse.id).unwrap().len(), 1);

        assert!(matches!(
            state.delete_appointment(&doc, &appt.id),
            Err(SchedulingError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn concurrent_bookings_never_double_book() {
        let state = Arc::new(CoreState::in_memory(SchedulingConfig::default()).unwrap());
        let doctor = state.register_doctor("Dr. Chen", None).unwrap();
        let patients: Vec<Uuid> = (0..8)
            .map(|i| state.register_patient(&format!("Patient {i}")).unwrap().id)
            .collect();

        let handles: Vec<_> = patients
            .into_iter()
            .enumerate()
            .map(|(i, patient)| {
                let state = Arc::clone(&state);
                let doctor = doctor.id;
                thread::spawn(move || {
                    // Every request overlaps 09:20-09:25
                    let start = format!("09:{:02}", i * 2);
                    let end = format!("09:{:02}", 25 + i);
                    let request = booking(patient, doctor, &start, &end);
                    state.create_appointment(&Caller::patient(patient), &request)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let booked = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(booked, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, SchedulingError::Conflict(_))));
    }

    #[test]
    fn separate_connections_serialize_on_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carebook.db");

        let first = Arc::new(CoreState::open(&path, SchedulingConfig::default()).unwrap());
        let doctor = first.register_doctor("Dr. Chen", None).unwrap();
        let patient = first.register_patient("Pat").unwrap();
        let second = Arc::new(CoreState::open(&path, SchedulingConfig::default()).unwrap());
        assert_eq!(second.db_path(), Some(path.as_path()));

        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|state| {
                let (patient, doctor) = (patient.id, doctor.id);
                thread::spawn(move || {
                    let request = booking(patient, doctor, "10:00", "10:30");
                    state.create_appointment(&Caller::patient(patient), &request)
                })
            })
            .collect();

        let booked = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(booked, 1);

        let check = CoreState::open(&path, SchedulingConfig::default()).unwrap();
        let all = check.list_visible(&Caller::admin(Uuid::new_v4())).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn shifts_through_state() {
        let state = CoreState::in_memory(SchedulingConfig::default()).unwrap();
        let nurse = state.register_nurse("Sam").unwrap();
        let me = Caller::nurse(nurse.id);
        let req = NewShiftSlot {
            caregiver_id: nurse.id,
            day_of_week: crate::models::enums::DayOfWeek::Wednesday,
            shift: crate::models::enums::Shift::Afternoon,
            start_time: "13:00".into(),
            end_time: "19:00".into(),
            is_available: true,
        };

        let slot = state.create_shift(&me, CaregiverKind::Nurse, &req).unwrap();
        assert!(matches!(
            state.create_shift(&me, CaregiverKind::Nurse, &req),
            Err(SchedulingError::Conflict(_))
        ));
        assert_eq!(state.list_shifts(CaregiverKind::Nurse, &nurse.id).unwrap().len(), 1);
        state.delete_shift(&me, CaregiverKind::Nurse, &slot.id).unwrap();
        assert!(state.list_shifts(CaregiverKind::Nurse, &nurse.id).unwrap().is_empty());
    }
}
