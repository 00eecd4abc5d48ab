//! Assistant conversations, lab results and derived health insights.

use chrono::{DateTime, NaiveDate, Utc};
use sehati_ids::EntityId;
use serde::{Deserialize, Serialize};

// ============================================================================
// Conversations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Coarse tag telling the caller how to present a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Greeting,
    LabAnalysis,
    SymptomAssessment,
    MedicationInfo,
    RiskAssessment,
    Booking,
    Recommendation,
    General,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Greeting => "greeting",
            MessageType::LabAnalysis => "lab_analysis",
            MessageType::SymptomAssessment => "symptom_assessment",
            MessageType::MedicationInfo => "medication_info",
            MessageType::RiskAssessment => "risk_assessment",
            MessageType::Booking => "booking",
            MessageType::Recommendation => "recommendation",
            MessageType::General => "general",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Book,
    Call,
    Info,
}

/// A button the caller may render under a reply. The store never executes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub label: String,
    pub action_id: String,
    pub action_type: ActionType,
}

impl SuggestedAction {
    pub fn new(label: &str, action_id: &str, action_type: ActionType) -> Self {
        Self {
            label: label.to_owned(),
            action_id: action_id.to_owned(),
            action_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AIMessage {
    pub id: EntityId,
    pub role: MessageRole,
    pub content: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub suggested_actions: Vec<SuggestedAction>,
    pub has_disclaimer: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AIConversation {
    pub id: EntityId,
    pub patient_id: String,
    pub messages: Vec<AIMessage>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Lab results
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Normal,
    High,
    Low,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Worsening,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub id: String,
    /// Stable machine key such as `glucose_fasting`.
    pub test_key: String,
    pub test_name: String,
    pub value: f64,
    pub unit: String,
    pub reference_range: String,
    pub status: LabStatus,
    pub trend: Trend,
    pub date: NaiveDate,
}

// ============================================================================
// Derived insights
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthRisk {
    pub key: String,
    pub condition: String,
    pub level: RiskLevel,
    pub factors: Vec<String>,
    pub recommendation: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LabResult,
    Medication,
    Checkup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// An alert derived from current data. `key` is stable across refreshes so dismissals stick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub key: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action: Option<SuggestedAction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Diet,
    Exercise,
    Sleep,
    Monitoring,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifestyleRecommendation {
    pub category: RecommendationCategory,
    pub title: String,
    pub description: String,
    pub priority: RiskLevel,
}

/// Urgency of a symptom assessment, in increasing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Soon,
    Urgent,
    /// Declared for callers but not produced by the current assessment rules.
    Emergency,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymptomAssessment {
    pub symptoms: Vec<String>,
    pub red_flags: Vec<String>,
    pub urgency: Urgency,
    #[serde(default)]
    pub suggested_specialty: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabAnalysis {
    pub improving: Vec<LabResult>,
    pub normal: Vec<LabResult>,
    pub abnormal: Vec<LabResult>,
    pub explanation: String,
}
