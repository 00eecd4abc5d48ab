//! Post-visit follow-ups and their message threads.

use chrono::{DateTime, NaiveDate, Utc};
use sehati_ids::EntityId;
use serde::{Deserialize, Serialize};

/// What the patient reports after a visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientResponse {
    Improved,
    Same,
    Worsened,
}

/// Follow-up lifecycle.
///
/// ```text
/// pending_response ──improved──▶ improved  ─┐
///                  ──same──────▶ same      ─┼─doctor──▶ completed
///                  ──worsened──▶ escalated ─┘
/// pending_response ──timeout───▶ no_response
/// ```
///
/// A `worsened` response never appears as a status: it always escalates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    PendingResponse,
    Improved,
    Same,
    Escalated,
    Completed,
    NoResponse,
}

impl FollowUpStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FollowUpStatus::Completed | FollowUpStatus::NoResponse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FollowUpStatus::PendingResponse => "pending_response",
            FollowUpStatus::Improved => "improved",
            FollowUpStatus::Same => "same",
            FollowUpStatus::Escalated => "escalated",
            FollowUpStatus::Completed => "completed",
            FollowUpStatus::NoResponse => "no_response",
        }
    }
}

impl From<PatientResponse> for FollowUpStatus {
    fn from(response: PatientResponse) -> Self {
        match response {
            PatientResponse::Improved => FollowUpStatus::Improved,
            PatientResponse::Same => FollowUpStatus::Same,
            PatientResponse::Worsened => FollowUpStatus::Escalated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostVisitFollowUp {
    pub id: EntityId,
    pub appointment_id: EntityId,
    pub patient_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub visit_date: NaiveDate,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub patient_response: Option<PatientResponse>,
    #[serde(default)]
    pub response_notes: Option<String>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    pub status: FollowUpStatus,
    #[serde(default)]
    pub doctor_notes: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewFollowUp {
    pub appointment_id: EntityId,
    pub patient_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub visit_date: NaiveDate,
    pub scheduled_for: DateTime<Utc>,
    pub questions: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Patient,
    Doctor,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowUpMessage {
    pub id: EntityId,
    pub follow_up_id: EntityId,
    pub sender: MessageSender,
    pub text: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worsened_response_maps_to_escalated() {
        assert_eq!(
            FollowUpStatus::from(PatientResponse::Worsened),
            FollowUpStatus::Escalated
        );
        assert_eq!(
            FollowUpStatus::from(PatientResponse::Improved),
            FollowUpStatus::Improved
        );
        assert_eq!(FollowUpStatus::from(PatientResponse::Same), FollowUpStatus::Same);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&FollowUpStatus::PendingResponse).unwrap();
        assert_eq!(json, "\"pending_response\"");
        assert_eq!(FollowUpStatus::NoResponse.as_str(), "no_response");
    }
}
