//! Appointment reminders: which approved visits start soon and have not been
//! reminded yet. Delivery is the caller's job; this only tracks the flag.

use chrono::{Datelike, Duration, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::SchedulingError;
use crate::db;
use crate::models::enums::AppointmentStatus;
use crate::models::Appointment;

/// APPROVED appointments starting in `[now, now + window]` with no reminder sent,
/// soonest first.
pub fn due_reminders(
    conn: &Connection,
    now: NaiveDateTime,
    window: Duration,
) -> Result<Vec<Appointment>, SchedulingError> {
    // Stored dates are four-digit years
    let until = now
        .checked_add_signed(window)
        .filter(|until| until.year() <= 9999)
        .ok_or_else(|| {
            SchedulingError::InvalidArgument("Reminder window is too large".into())
        })?;
    let candidates = db::list_unreminded_approved_between(conn, &now.date(), &until.date())?;

    Ok(candidates
        .into_iter()
        .filter(|appt| {
            let start = appt.scheduled_start();
            start >= now && start <= until
        })
        .collect())
}

/// Stamp an appointment as reminded. Only APPROVED appointments take a reminder.
pub fn mark_reminder_sent(
    conn: &Connection,
    now: NaiveDateTime,
    id: &Uuid,
) -> Result<(), SchedulingError> {
    let appt = db::get_appointment(conn, id)?
        .ok_or_else(|| SchedulingError::not_found("Appointment", id))?;
    if appt.status != AppointmentStatus::Approved {
        return Err(SchedulingError::PreconditionFailed(format!(
            "Cannot send a reminder for a {} appointment",
            appt.status
        )));
    }

    db::set_reminder_sent(conn, id, &now)?;
    tracing::debug!(appointment_id = %id, "Reminder marked as sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::fixtures::{at, june_first, Fixture};

    #[test]
    fn window_picks_approved_unreminded_only() {
        let f = Fixture::new();
        let soon = f.seed(june_first(), (9, 0), (9, 30), AppointmentStatus::Approved);
        f.seed(june_first(), (10, 0), (10, 30), AppointmentStatus::PendingApproval);
        f.seed(june_first().succ_opt().unwrap(), (9, 0), (9, 30), AppointmentStatus::Approved);

        let now = at(june_first() - Duration::days(1), 12, 0);
        let due = due_reminders(&f.conn, now, Duration::hours(24)).unwrap();
        assert_eq!(due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![soon.id]);

        mark_reminder_sent(&f.conn, now, &soon.id).unwrap();
        assert!(due_reminders(&f.conn, now, Duration::hours(24)).unwrap().is_empty());
        assert_eq!(
            db::get_appointment(&f.conn, &soon.id).unwrap().unwrap().reminder_sent_at,
            Some(now)
        );
    }

    #[test]
    fn past_appointments_are_not_due() {
        let f = Fixture::new();
        f.seed(june_first(), (9, 0), (9, 30), AppointmentStatus::Approved);
        let due = due_reminders(&f.conn, at(june_first(), 9, 1), Duration::hours(24)).unwrap();
        assert!(due.is_empty());
    }

    #[test]
    fn oversized_window_is_invalid() {
        let f = Fixture::new();
        let appt = f.seed(june_first(), (9, 0), (9, 30), AppointmentStatus::Approved);
        let now = at(june_first(), 8, 0);

        for window in [Duration::MAX, Duration::days(365 * 10_000)] {
            let err = due_reminders(&f.conn, now, window).unwrap_err();
            assert!(matches!(err, SchedulingError::InvalidArgument(_)));
        }

        let year = due_reminders(&f.conn, now, Duration::days(365)).unwrap();
        assert_eq!(year.iter().map(|a| a.id).collect::<Vec<_>>(), vec![appt.id]);
    }

    #[test]
    fn reminder_requires_approved() {
        let f = Fixture::new();
        let pending = f.seed(june_first(), (9, 0), (9, 30), AppointmentStatus::PendingApproval);
        let err = mark_reminder_sent(&f.conn, at(june_first(), 8, 0), &pending.id).unwrap_err();
        assert!(matches!(err, SchedulingError::PreconditionFailed(_)));
        assert!(matches!(
            mark_reminder_sent(&f.conn, at(june_first(), 8, 0), &Uuid::new_v4()),
            Err(SchedulingError::NotFound { .. })
        ));
    }
}
