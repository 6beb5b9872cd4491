use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CaregiverKind, DayOfWeek, Shift};
use super::time::hhmm;

/// Weekly recurring availability window for one caregiver.
///
/// Doctor and nurse slots share this shape but live in separate tables;
/// `kind` records which one a slot came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSlot {
    pub id: Uuid,
    pub kind: CaregiverKind,
    pub caregiver_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub shift: Shift,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShiftSlot {
    pub caregiver_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub shift: Shift,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub is_available: bool,
}

/// In-place edit. The caregiver is fixed at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftSlotUpdate {
    pub day_of_week: Option<DayOfWeek>,
    pub shift: Option<Shift>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_available: Option<bool>,
}
