//! Medical records, the record audit trail, access grants and chronic conditions.

use chrono::{DateTime, NaiveDate, Utc};
use sehati_ids::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Visit,
    LabResult,
    Prescription,
    Imaging,
    Vaccination,
    Surgery,
    Allergy,
    Note,
}

/// Where a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Doctor,
    Lab,
    Pharmacy,
    Patient,
    Import,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: EntityId,
    pub patient_id: String,
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub clinic_id: Option<String>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub is_verified: bool,
    pub source: RecordSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewMedicalRecord {
    pub patient_id: String,
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub clinic_id: Option<String>,
    pub clinic_name: Option<String>,
    pub attachments: Vec<String>,
    pub source: RecordSource,
}

#[derive(Clone, Debug, Default)]
pub struct MedicalRecordUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub attachments: Option<Vec<String>>,
    pub is_verified: Option<bool>,
}

// ============================================================================
// Audit trail
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RecordCreated,
    RecordDeleted,
    AccessRequested,
    AccessApproved,
    AccessDenied,
    AccessRevoked,
}

/// One row of the medical-record audit trail. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: EntityId,
    pub patient_id: String,
    pub actor_id: String,
    pub action: AuditAction,
    pub resource_id: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Access grants
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterType {
    Doctor,
    Clinic,
    Lab,
    FamilyMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    Pending,
    Approved,
    Denied,
    Revoked,
}

impl AccessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Approved => "approved",
            AccessStatus::Denied => "denied",
            AccessStatus::Revoked => "revoked",
        }
    }
}

/// A request by a third party to read a patient's medical file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalFileAccess {
    pub id: EntityId,
    pub patient_id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_type: RequesterType,
    pub reason: String,
    pub status: AccessStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct NewAccessRequest {
    pub patient_id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_type: RequesterType,
    pub reason: String,
}

// ============================================================================
// Chronic conditions
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    Active,
    Controlled,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChronicCondition {
    pub id: EntityId,
    pub patient_id: String,
    pub name: String,
    pub diagnosed_date: NaiveDate,
    pub status: ConditionStatus,
    pub severity: Severity,
    pub treatment_plan: String,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub next_checkup: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewChronicCondition {
    pub patient_id: String,
    pub name: String,
    pub diagnosed_date: NaiveDate,
    pub status: ConditionStatus,
    pub severity: Severity,
    pub treatment_plan: String,
    pub medications: Vec<String>,
    pub next_checkup: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ChronicConditionUpdate {
    pub status: Option<ConditionStatus>,
    pub severity: Option<Severity>,
    pub treatment_plan: Option<String>,
    pub medications: Option<Vec<String>>,
    pub next_checkup: Option<Option<NaiveDate>>,
    pub notes: Option<String>,
}
