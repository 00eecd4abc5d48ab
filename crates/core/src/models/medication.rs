//! Medication reminders and dose logs.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sehati_ids::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFrequency {
    OnceDaily,
    TwiceDaily,
    ThreeTimesDaily,
    FourTimesDaily,
    EveryOtherDay,
    Weekly,
    AsNeeded,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicationReminder {
    pub id: EntityId,
    pub patient_id: String,
    #[serde(default)]
    pub family_member_id: Option<EntityId>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: ReminderFrequency,
    pub times: Vec<NaiveTime>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub instructions: Option<String>,
    pub total_quantity: u32,
    pub remaining_quantity: u32,
    pub refill_threshold: u32,
    pub is_active: bool,
    #[serde(default)]
    pub auto_refill: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicationReminder {
    pub fn needs_refill(&self) -> bool {
        self.remaining_quantity <= self.refill_threshold
    }
}

#[derive(Clone, Debug)]
pub struct NewMedicationReminder {
    pub patient_id: String,
    pub family_member_id: Option<EntityId>,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: ReminderFrequency,
    pub times: Vec<NaiveTime>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub instructions: Option<String>,
    pub total_quantity: u32,
    pub refill_threshold: u32,
    pub auto_refill: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MedicationReminderUpdate {
    pub dosage: Option<String>,
    pub frequency: Option<ReminderFrequency>,
    pub times: Option<Vec<NaiveTime>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub instructions: Option<String>,
    pub refill_threshold: Option<u32>,
    pub auto_refill: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Taken,
    Skipped,
    Pending,
    Snoozed,
}

/// One dose event. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicationLog {
    pub id: EntityId,
    pub reminder_id: EntityId,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
    pub status: DoseStatus,
    #[serde(default)]
    pub snooze_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}
