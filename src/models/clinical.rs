//! Downstream clinical records. Each one hangs off a resolved appointment;
//! patient and doctor are copied from it at creation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{LabReportStatus, PrescriptionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub test_name: String,
    pub result: Option<String>,
    pub status: LabReportStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub status: PrescriptionStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiagnosis {
    pub appointment_id: Uuid,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLabReport {
    pub appointment_id: Uuid,
    pub test_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrescription {
    pub appointment_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
}

/// Every record hanging off one appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecords {
    pub diagnoses: Vec<Diagnosis>,
    pub lab_reports: Vec<LabReport>,
    pub prescriptions: Vec<Prescription>,
}

impl ClinicalRecords {
    pub fn is_empty(&self) -> bool {
        self.diagnoses.is_empty() && self.lab_reports.is_empty() && self.prescriptions.is_empty()
    }
}

/// Which downstream table a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Diagnosis,
    LabReport,
    Prescription,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Diagnosis => "Diagnosis",
            Self::LabReport => "LabReport",
            Self::Prescription => "Prescription",
        }
    }
}
