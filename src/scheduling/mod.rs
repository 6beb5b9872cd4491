//! Scheduling core: conflict checking, the appointment workflow, the shift
//! registry and the clinical record gateway.
//!
//! Every operation is a synchronous function over a `&Connection`. The ones
//! that check and then write open a `BEGIN IMMEDIATE` transaction so the
//! check cannot be invalidated before the write commits.

pub mod conflict;
pub mod error;
pub mod records;
pub mod reminders;
pub mod shifts;
pub mod validation;
pub mod workflow;

pub use conflict::{ensure_free, find_conflict, has_conflict, overlaps, Booking};
pub use error::SchedulingError;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::db::{
        insert_appointment, insert_doctor, insert_nurse, insert_patient, open_memory_database,
    };
    use crate::models::enums::AppointmentStatus;
    use crate::models::{Appointment, Doctor, Nurse, Patient};

    pub fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    pub fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    pub fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_time(hm(h, m))
    }

    /// In-memory database with two patients, two doctors and a nurse registered.
    pub struct Fixture {
        pub conn: Connection,
        pub patient: Uuid,
        pub other_patient: Uuid,
        pub doctor: Uuid,
        pub other_doctor: Uuid,
        pub nurse: Uuid,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::on(open_memory_database().unwrap())
        }

        /// Register the same people on an already-open database.
        pub fn on(conn: Connection) -> Self {
            let f = Self {
                conn,
                patient: Uuid::new_v4(),
                other_patient: Uuid::new_v4(),
                doctor: Uuid::new_v4(),
                other_doctor: Uuid::new_v4(),
                nurse: Uuid::new_v4(),
            };
            let patients = [(f.patient, "Pat Doe"), (f.other_patient, "Lee Roe")];
            for (id, name) in patients {
                let patient = Patient {
                    id,
                    name: name.into(),
                };
                insert_patient(&f.conn, &patient).unwrap();
            }
            let doctors = [
                (f.doctor, "Dr. Chen", Some("General practice")),
                (f.other_doctor, "Dr. Okafor", None),
            ];
            for (id, name, specialty) in doctors {
                let doctor = Doctor {
                    id,
                    name: name.into(),
                    specialty: specialty.map(str::to_string),
                };
                insert_doctor(&f.conn, &doctor).unwrap();
            }
            let nurse = Nurse {
                id: f.nurse,
                name: "Sam Ruiz".into(),
            };
            insert_nurse(&f.conn, &nurse).unwrap();
            f
        }

        /// Unsaved appointment of `patient` with `doctor`.
        pub fn appointment(
            &self,
            date: NaiveDate,
            start: (u32, u32),
            end: (u32, u32),
            status: AppointmentStatus,
        ) -> Appointment {
            let created = at(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 8, 0);
            Appointment {
                id: Uuid::new_v4(),
                patient_id: self.patient,
                doctor_id: self.doctor,
                nurse_id: None,
                date,
                start_time: hm(start.0, start.1),
                end_time: hm(end.0, end.1),
                status,
                reason: None,
                notes: None,
                rejection_reason: None,
                cancel_reason: None,
                is_first_visit: false,
                is_virtual: false,
                virtual_meeting_link: None,
                reminder_sent_at: None,
                created_at: created,
                updated_at: created,
            }
        }

        /// Insert an appointment directly, bypassing the workflow.
        pub fn seed(
            &self,
            date: NaiveDate,
            start: (u32, u32),
            end: (u32, u32),
            status: AppointmentStatus,
        ) -> Appointment {
            let appt = self.appointment(date, start, end, status);
            insert_appointment(&self.conn, &appt).unwrap();
            appt
        }
    }
}
