use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::directory::{Doctor, Nurse, Patient};
use super::enums::{AppointmentStatus, CaregiverKind};
use super::time::hhmm;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub nurse_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancel_reason: Option<String>,
    pub is_first_visit: bool,
    pub is_virtual: bool,
    pub virtual_meeting_link: Option<String>,
    pub reminder_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Instant the appointment begins: `date` + `start_time`.
    pub fn scheduled_start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// Caregiver of the given kind assigned to this appointment, if any.
    pub fn caregiver(&self, kind: CaregiverKind) -> Option<Uuid> {
        match kind {
            CaregiverKind::Doctor => Some(self.doctor_id),
            CaregiverKind::Nurse => self.nurse_id,
        }
    }
}

/// Booking request. Times arrive as `HH:MM` strings and are validated on create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub nurse_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_first_visit: bool,
    pub is_virtual: bool,
    pub virtual_meeting_link: Option<String>,
}

/// Admin field edit. `None` leaves a field untouched.
///
/// Status is deliberately absent: status changes outside the role-gated
/// transitions go through the audited force-transition path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// `Some(None)` removes the nurse.
    pub nurse_id: Option<Option<Uuid>>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_first_visit: Option<bool>,
    pub is_virtual: Option<bool>,
    pub virtual_meeting_link: Option<String>,
}

impl AppointmentUpdate {
    /// Whether this edit moves a caregiver or the interval.
    pub fn reschedules(&self) -> bool {
        self.doctor_id.is_some()
            || self.nurse_id.is_some()
            || self.date.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
    }
}

/// Appointment with every referenced party resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub appointment: Appointment,
    pub patient: Patient,
    pub doctor: Doctor,
    pub nurse: Option<Nurse>,
}

/// One status change applied outside the ordinary transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentAuditEntry {
    pub id: i64,
    pub appointment_id: Uuid,
    pub from_status: AppointmentStatus,
    pub to_status: AppointmentStatus,
    pub actor_id: Uuid,
    pub reason: String,
    pub recorded_at: NaiveDateTime,
}
