use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form doubles as the wire token and the stored column value.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(AppointmentStatus {
    PendingApproval => "PENDING_APPROVAL",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    NoShow => "NO_SHOW",
});

impl AppointmentStatus {
    /// Closed without the visit taking place. Only these may release a slot.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

str_enum!(Role {
    Admin => "ADMIN",
    Doctor => "DOCTOR",
    Nurse => "NURSE",
    Patient => "PATIENT",
});

str_enum!(CaregiverKind {
    Doctor => "DOCTOR",
    Nurse => "NURSE",
});

impl CaregiverKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Doctor => "Doctor",
            Self::Nurse => "Nurse",
        }
    }
}

str_enum!(DayOfWeek {
    Monday => "MONDAY",
    Tuesday => "TUESDAY",
    Wednesday => "WEDNESDAY",
    Thursday => "THURSDAY",
    Friday => "FRIDAY",
    Saturday => "SATURDAY",
    Sunday => "SUNDAY",
});

str_enum!(Shift {
    Morning => "MORNING",
    Afternoon => "AFTERNOON",
    Evening => "EVENING",
    Night => "NIGHT",
    FullDay => "FULL_DAY",
});

str_enum!(LabReportStatus {
    Pending => "PENDING",
    Completed => "COMPLETED",
});

str_enum!(PrescriptionStatus {
    Active => "ACTIVE",
    Fulfilled => "FULFILLED",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_tokens_match_wire_format() {
        for (variant, s) in [
            (AppointmentStatus::PendingApproval, "PENDING_APPROVAL"),
            (AppointmentStatus::Approved, "APPROVED"),
            (AppointmentStatus::Rejected, "REJECTED"),
            (AppointmentStatus::Completed, "COMPLETED"),
            (AppointmentStatus::Cancelled, "CANCELLED"),
            (AppointmentStatus::NoShow, "NO_SHOW"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AppointmentStatus::from_str(s).unwrap(), variant);
            // serde and the column value must agree
            assert_eq!(serde_json::to_value(variant).unwrap(), s);
        }
    }

    #[test]
    fn only_rejected_and_cancelled_are_closed() {
        assert!(!AppointmentStatus::PendingApproval.is_closed());
        assert!(!AppointmentStatus::Approved.is_closed());
        assert!(AppointmentStatus::Rejected.is_closed());
        assert!(!AppointmentStatus::Completed.is_closed());
        assert!(AppointmentStatus::Cancelled.is_closed());
        assert!(!AppointmentStatus::NoShow.is_closed());
    }

    #[test]
    fn shift_full_day_token() {
        assert_eq!(Shift::FullDay.as_str(), "FULL_DAY");
        let parsed: Shift = serde_json::from_str("\"FULL_DAY\"").unwrap();
        assert_eq!(parsed, Shift::FullDay);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(AppointmentStatus::from_str("pending").is_err());
        assert!(Role::from_str("SUPERUSER").is_err());
        assert!(DayOfWeek::from_str("").is_err());
    }
}
