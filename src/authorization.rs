//! Access Policy: the single role → action permission table.
//!
//! Every mutation (and every read of an appointment or clinical record)
//! consults `POLICY` through [`authorize`]. A rule grants a role an action,
//! optionally restricted by an ownership relation between the caller's
//! profile id and the parties of the target:
//!
//! 1. No rule for (action, role) → DENY
//! 2. Rule with `Ownership::Any` → ALLOW
//! 3. Rule with an ownership relation → ALLOW only if the caller is that party
//!
//! Default-deny. The caller's profile id arrives already resolved in
//! [`Caller`]; nothing here looks up accounts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{CaregiverKind, Role};
use crate::models::{Appointment, AppointmentDetails};
use crate::scheduling::SchedulingError;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Authenticated caller: role plus the role-specific profile id
/// (patient id for patients, doctor id for doctors, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub role: Role,
    pub profile_id: Uuid,
}

impl Caller {
    pub fn new(role: Role, profile_id: Uuid) -> Self {
        Self { role, profile_id }
    }

    pub fn admin(profile_id: Uuid) -> Self {
        Self::new(Role::Admin, profile_id)
    }

    pub fn doctor(profile_id: Uuid) -> Self {
        Self::new(Role::Doctor, profile_id)
    }

    pub fn nurse(profile_id: Uuid) -> Self {
        Self::new(Role::Nurse, profile_id)
    }

    pub fn patient(profile_id: Uuid) -> Self {
        Self::new(Role::Patient, profile_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CreateAppointment,
    ApproveAppointment,
    RejectAppointment,
    CancelAppointment,
    CompleteAppointment,
    MarkNoShow,
    UpdateAppointment,
    ForceTransition,
    DeleteAppointment,
    ReadAppointment,
    ManageDoctorShift,
    ManageNurseShift,
    CreateDiagnosis,
    CreateLabReport,
    CreatePrescription,
    CompleteLabReport,
    FulfillPrescription,
    ReassignClinicalRecord,
    DeleteClinicalRecord,
}

impl Action {
    /// Shift management action for a caregiver kind.
    pub fn manage_shift(kind: CaregiverKind) -> Self {
        match kind {
            CaregiverKind::Doctor => Self::ManageDoctorShift,
            CaregiverKind::Nurse => Self::ManageNurseShift,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::CreateAppointment => "book this appointment",
            Self::ApproveAppointment => "approve this appointment",
            Self::RejectAppointment => "reject this appointment",
            Self::CancelAppointment => "cancel this appointment",
            Self::CompleteAppointment => "complete this appointment",
            Self::MarkNoShow => "mark this appointment as a no-show",
            Self::UpdateAppointment => "edit appointments",
            Self::ForceTransition => "force an appointment status",
            Self::DeleteAppointment => "delete this appointment",
            Self::ReadAppointment => "view this appointment",
            Self::ManageDoctorShift => "manage this doctor's shifts",
            Self::ManageNurseShift => "manage this nurse's shifts",
            Self::CreateDiagnosis => "record a diagnosis for this appointment",
            Self::CreateLabReport => "order a lab report for this appointment",
            Self::CreatePrescription => "prescribe for this appointment",
            Self::CompleteLabReport => "complete this lab report",
            Self::FulfillPrescription => "fulfill this prescription",
            Self::ReassignClinicalRecord => "reassign this record",
            Self::DeleteClinicalRecord => "delete this record",
        }
    }
}

/// Relation the caller must have to the target for a rule to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Any,
    OwningPatient,
    AssignedDoctor,
    OwningCaregiver,
}

/// Identities referenced by the target of an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parties {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub caregiver_id: Option<Uuid>,
}

impl Parties {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of_appointment(appt: &Appointment) -> Self {
        Self {
            patient_id: Some(appt.patient_id),
            doctor_id: Some(appt.doctor_id),
            caregiver_id: None,
        }
    }

    pub fn patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    pub fn caregiver(caregiver_id: Uuid) -> Self {
        Self {
            caregiver_id: Some(caregiver_id),
            ..Self::default()
        }
    }
}

/// Why access was granted (or denied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    Unrestricted,
    OwningPatient,
    AssignedDoctor,
    OwningCaregiver,
    /// No rule grants this role the action.
    RoleNotPermitted,
    /// A rule exists but the caller is not the required party.
    NotOwner(Ownership),
}

#[derive(Debug, Clone, Copy)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

// ═══════════════════════════════════════════════════════════
// Policy table
// ═══════════════════════════════════════════════════════════

use Action as A;
use Ownership as O;
use Role as R;

pub const POLICY: &[(Action, Role, Ownership)] = &[
    (A::CreateAppointment, R::Patient, O::OwningPatient),
    (A::CreateAppointment, R::Admin, O::Any),
    (A::CreateAppointment, R::Doctor, O::Any),
    (A::CreateAppointment, R::Nurse, O::Any),
    (A::ApproveAppointment, R::Doctor, O::AssignedDoctor),
    (A::RejectAppointment, R::Doctor, O::AssignedDoctor),
    (A::CompleteAppointment, R::Doctor, O::AssignedDoctor),
    (A::MarkNoShow, R::Doctor, O::AssignedDoctor),
    (A::CancelAppointment, R::Patient, O::OwningPatient),
    (A::UpdateAppointment, R::Admin, O::Any),
    (A::ForceTransition, R::Admin, O::Any),
    (A::DeleteAppointment, R::Admin, O::Any),
    (A::DeleteAppointment, R::Doctor, O::AssignedDoctor),
    (A::ReadAppointment, R::Admin, O::Any),
    (A::ReadAppointment, R::Nurse, O::Any),
    (A::ReadAppointment, R::Doctor, O::AssignedDoctor),
    (A::ReadAppointment, R::Patient, O::OwningPatient),
    (A::ManageDoctorShift, R::Admin, O::Any),
    (A::ManageDoctorShift, R::Doctor, O::OwningCaregiver),
    (A::ManageNurseShift, R::Admin, O::Any),
    (A::ManageNurseShift, R::Nurse, O::OwningCaregiver),
    (A::CreateDiagnosis, R::Admin, O::Any),
    (A::CreateDiagnosis, R::Doctor, O::AssignedDoctor),
    (A::CreateLabReport, R::Admin, O::Any),
    (A::CreateLabReport, R::Doctor, O::AssignedDoctor),
    (A::CreateLabReport, R::Nurse, O::Any),
    (A::CreatePrescription, R::Admin, O::Any),
    (A::CreatePrescription, R::Doctor, O::AssignedDoctor),
    (A::CompleteLabReport, R::Admin, O::Any),
    (A::CompleteLabReport, R::Doctor, O::AssignedDoctor),
    (A::CompleteLabReport, R::Nurse, O::Any),
    (A::FulfillPrescription, R::Admin, O::Any),
    (A::ReassignClinicalRecord, R::Admin, O::Any),
    (A::ReassignClinicalRecord, R::Doctor, O::AssignedDoctor),
    (A::DeleteClinicalRecord, R::Admin, O::Any),
    (A::DeleteClinicalRecord, R::Doctor, O::AssignedDoctor),
];

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

/// Evaluate the policy for one caller, action and target.
pub fn check_access(caller: &Caller, action: Action, parties: &Parties) -> AccessDecision {
    let Some(&(_, _, ownership)) = POLICY
        .iter()
        .find(|(a, r, _)| *a == action && *r == caller.role)
    else {
        return AccessDecision {
            allowed: false,
            reason: AccessReason::RoleNotPermitted,
        };
    };

    let me = Some(caller.profile_id);
    let (allowed, granted) = match ownership {
        O::Any => (true, AccessReason::Unrestricted),
        O::OwningPatient => (parties.patient_id == me, AccessReason::OwningPatient),
        O::AssignedDoctor => (parties.doctor_id == me, AccessReason::AssignedDoctor),
        O::OwningCaregiver => (parties.caregiver_id == me, AccessReason::OwningCaregiver),
    };

    AccessDecision {
        allowed,
        reason: if allowed {
            granted
        } else {
            AccessReason::NotOwner(ownership)
        },
    }
}

/// [`check_access`] as a `Result`, with a caller-facing `Forbidden` reason.
pub fn authorize(
    caller: &Caller,
    action: Action,
    parties: &Parties,
) -> Result<(), SchedulingError> {
    let decision = check_access(caller, action, parties);
    if decision.allowed {
        return Ok(());
    }

    let message = match decision.reason {
        AccessReason::NotOwner(O::AssignedDoctor) => {
            format!("Only the assigned doctor can {}", action.describe())
        }
        AccessReason::NotOwner(O::OwningPatient) => {
            format!("Only the patient who owns this appointment can {}", action.describe())
        }
        AccessReason::NotOwner(_) => format!("Only the owning caregiver can {}", action.describe()),
        _ => format!("Role {} is not allowed to {}", caller.role, action.describe()),
    };
    tracing::warn!(role = %caller.role, caller = %caller.profile_id, ?action, "Access denied");
    Err(SchedulingError::Forbidden(message))
}

pub fn can_view_appointment(caller: &Caller, appt: &Appointment) -> bool {
    check_access(caller, Action::ReadAppointment, &Parties::of_appointment(appt)).allowed
}

/// Post-filter a result set down to what the caller may see.
pub fn filter_visible(
    caller: &Caller,
    details: Vec<AppointmentDetails>,
) -> Vec<AppointmentDetails> {
    details
        .into_iter()
        .filter(|d| can_view_appointment(caller, &d.appointment))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn appointment_parties() -> Parties {
        Parties {
            patient_id: Some(id(1)),
            doctor_id: Some(id(2)),
            caregiver_id: None,
        }
    }

    fn allowed(caller: Caller, action: Action, parties: &Parties) -> bool {
        check_access(&caller, action, parties).allowed
    }

    // ── Approve / reject ─────────────────────────────────

    #[test]
    fn assigned_doctor_may_approve() {
        let parties = appointment_parties();
        let decision = check_access(&Caller::doctor(id(2)), Action::ApproveAppointment, &parties);
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::AssignedDoctor);
    }

    #[test]
    fn other_doctor_may_not_approve() {
        let parties = appointment_parties();
        let err = authorize(&Caller::doctor(id(3)), Action::ApproveAppointment, &parties)
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Forbidden(_)));
        assert!(err.to_string().contains("assigned doctor"));
    }

    #[test]
    fn admin_may_not_approve() {
        let parties = appointment_parties();
        let decision = check_access(&Caller::admin(id(9)), Action::RejectAppointment, &parties);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, AccessReason::RoleNotPermitted);
    }

    // ── Cancel ───────────────────────────────────────────

    #[test]
    fn only_owning_patient_cancels() {
        let parties = appointment_parties();
        assert!(allowed(Caller::patient(id(1)), Action::CancelAppointment, &parties));
        assert!(!allowed(Caller::patient(id(4)), Action::CancelAppointment, &parties));
        assert!(!allowed(Caller::doctor(id(2)), Action::CancelAppointment, &parties));
    }

    // ── Create ───────────────────────────────────────────

    #[test]
    fn patient_books_only_for_self() {
        let me = Caller::patient(id(1));
        assert!(allowed(me, Action::CreateAppointment, &Parties::patient(id(1))));
        assert!(!allowed(me, Action::CreateAppointment, &Parties::patient(id(5))));
    }

    #[test]
    fn staff_book_on_behalf() {
        for caller in [Caller::admin(id(9)), Caller::doctor(id(7)), Caller::nurse(id(8))] {
            assert!(allowed(caller, Action::CreateAppointment, &Parties::patient(id(5))));
        }
    }

    // ── Update / delete ──────────────────────────────────

    #[test]
    fn only_admin_updates() {
        let parties = appointment_parties();
        assert!(allowed(Caller::admin(id(9)), Action::UpdateAppointment, &parties));
        assert!(!allowed(Caller::doctor(id(2)), Action::UpdateAppointment, &parties));
        assert!(!allowed(Caller::patient(id(1)), Action::ForceTransition, &parties));
    }

    #[test]
    fn assigned_doctor_may_delete() {
        let parties = appointment_parties();
        assert!(allowed(Caller::doctor(id(2)), Action::DeleteAppointment, &parties));
        assert!(!allowed(Caller::doctor(id(3)), Action::DeleteAppointment, &parties));
        assert!(!allowed(Caller::patient(id(1)), Action::DeleteAppointment, &parties));
    }

    // ── Shifts ───────────────────────────────────────────

    #[test]
    fn shifts_managed_by_admin_or_owner() {
        let doctor_shift = Parties::caregiver(id(2));
        assert!(allowed(Caller::admin(id(9)), Action::ManageDoctorShift, &doctor_shift));
        assert!(allowed(Caller::doctor(id(2)), Action::ManageDoctorShift, &doctor_shift));
        assert!(!allowed(Caller::doctor(id(3)), Action::ManageDoctorShift, &doctor_shift));
        // A nurse with the same id still cannot touch doctor shifts
        assert!(!allowed(Caller::nurse(id(2)), Action::ManageDoctorShift, &doctor_shift));
        assert_eq!(Action::manage_shift(CaregiverKind::Nurse), Action::ManageNurseShift);
    }

    // ── Reads ────────────────────────────────────────────

    #[test]
    fn read_visibility_by_identity() {
        let parties = appointment_parties();
        assert!(allowed(Caller::nurse(id(8)), Action::ReadAppointment, &parties));
        assert!(allowed(Caller::patient(id(1)), Action::ReadAppointment, &parties));
        assert!(!allowed(Caller::patient(id(4)), Action::ReadAppointment, &parties));
        assert!(!allowed(Caller::doctor(id(3)), Action::ReadAppointment, &parties));
    }

    #[test]
    fn every_action_has_a_rule() {
        use Action::*;
        for action in [
            CreateAppointment,
            ApproveAppointment,
            RejectAppointment,
            CancelAppointment,
            CompleteAppointment,
            MarkNoShow,
            UpdateAppointment,
            ForceTransition,
            DeleteAppointment,
            ReadAppointment,
            ManageDoctorShift,
            ManageNurseShift,
            CreateDiagnosis,
            CreateLabReport,
            CreatePrescription,
            CompleteLabReport,
            FulfillPrescription,
            ReassignClinicalRecord,
            DeleteClinicalRecord,
        ] {
            assert!(POLICY.iter().any(|(a, _, _)| *a == action), "{action:?} has no rule");
        }
    }
}
