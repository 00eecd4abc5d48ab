//! Enhanced features store.
//!
//! Medical records and their audit trail, third-party access grants, chronic conditions,
//! family members, medication reminders with dose logs, and post-visit follow-ups.
//!
//! Audit rule: only lifecycle boundary events are audited. Creating or deleting a record and
//! every access-grant transition append exactly one [`AuditLog`] row; editing a record does
//! not.

use crate::config::CoreConfig;
use crate::constants::{
    ACCESS_PREFIX, ADULT_AGE_YEARS, AUDIT_PREFIX, CONDITION_PREFIX, DOSE_LOG_PREFIX,
    ENHANCED_SLICE, FAMILY_PREFIX, FOLLOW_UP_MESSAGE_PREFIX, FOLLOW_UP_PREFIX, RECORD_PREFIX,
    REMINDER_PREFIX,
};
use crate::error::{StoreError, StoreResult};
use crate::models::family::*;
use crate::models::follow_up::*;
use crate::models::medication::*;
use crate::models::records::*;
use crate::persistence::{load_slice, save_slice, PersistedSlice, SliceStorage};
use chrono::{DateTime, Days, NaiveDate, Utc};
use sehati_ids::{EntityId, IdGenerator};
use sehati_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted fields of the enhanced features store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedSlice {
    pub medical_records: Vec<MedicalRecord>,
    pub audit_logs: Vec<AuditLog>,
    pub access_requests: Vec<MedicalFileAccess>,
    pub chronic_conditions: Vec<ChronicCondition>,
    pub family_members: Vec<FamilyMember>,
    pub medication_reminders: Vec<MedicationReminder>,
    pub medication_logs: Vec<MedicationLog>,
    pub follow_ups: Vec<PostVisitFollowUp>,
    pub follow_up_messages: Vec<FollowUpMessage>,
}

impl PersistedSlice for EnhancedSlice {
    const NAME: &'static str = ENHANCED_SLICE;
}

pub struct EnhancedStore {
    cfg: Arc<CoreConfig>,
    storage: Arc<dyn SliceStorage>,
    ids: IdGenerator,
    state: EnhancedSlice,
    selected_family_member: Option<EntityId>,
}

impl EnhancedStore {
    pub fn open(cfg: Arc<CoreConfig>, storage: Arc<dyn SliceStorage>) -> Self {
        let state = load_slice::<EnhancedSlice>(storage.as_ref());
        Self {
            cfg,
            storage,
            ids: IdGenerator::new(),
            state,
            selected_family_member: None,
        }
    }

    fn persist(&self) {
        save_slice(self.storage.as_ref(), &self.state);
    }

    pub fn snapshot(&self) -> &EnhancedSlice {
        &self.state
    }

    pub fn selected_family_member(&self) -> Option<&EntityId> {
        self.selected_family_member.as_ref()
    }

    pub fn select_family_member(&mut self, member: Option<EntityId>) {
        self.selected_family_member = member;
    }

    fn audit(
        &mut self,
        patient_id: &str,
        actor_id: &str,
        action: AuditAction,
        resource_id: &EntityId,
        details: String,
    ) {
        let id = self.ids.next(AUDIT_PREFIX);
        self.state.audit_logs.push(AuditLog {
            id,
            patient_id: patient_id.to_owned(),
            actor_id: actor_id.to_owned(),
            action,
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
        });
    }
}

// ============================================================================
// MEDICAL RECORDS
// ============================================================================

impl EnhancedStore {
    /// Adds a record and one `record_created` audit row.
    pub fn add_medical_record(&mut self, new: NewMedicalRecord) -> StoreResult<EntityId> {
        let title = NonEmptyText::new(&new.title)?;
        let now = Utc::now();
        let id = self.ids.next(RECORD_PREFIX);
        let actor = new
            .doctor_id
            .clone()
            .unwrap_or_else(|| self.cfg.user_id().to_owned());

        self.state.medical_records.push(MedicalRecord {
            id: id.clone(),
            patient_id: new.patient_id.clone(),
            record_type: new.record_type,
            title: title.into_inner(),
            description: new.description,
            date: new.date,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            clinic_id: new.clinic_id,
            clinic_name: new.clinic_name,
            attachments: new.attachments,
            is_verified: matches!(new.source, RecordSource::Doctor | RecordSource::Lab),
            source: new.source,
            created_at: now,
            updated_at: now,
        });
        self.audit(
            &new.patient_id,
            &actor,
            AuditAction::RecordCreated,
            &id,
            format!("record {id} created"),
        );
        self.persist();

        tracing::info!("medical record {} added for {}", id, new.patient_id);
        Ok(id)
    }

    /// Edits a record in place. Edits are not audited.
    pub fn update_medical_record(
        &mut self,
        id: &EntityId,
        update: MedicalRecordUpdate,
    ) -> StoreResult<()> {
        let record = self
            .state
            .medical_records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found("medical record", id))?;

        if let Some(title) = update.title {
            record.title = NonEmptyText::new(&title)?.into_inner();
        }
        if let Some(description) = update.description {
            record.description = description;
        }
        if let Some(date) = update.date {
            record.date = date;
        }
        if let Some(attachments) = update.attachments {
            record.attachments = attachments;
        }
        if let Some(verified) = update.is_verified {
            record.is_verified = verified;
        }
        record.updated_at = Utc::now();

        self.persist();
        Ok(())
    }

    pub fn verify_medical_record(&mut self, id: &EntityId) -> StoreResult<()> {
        self.update_medical_record(
            id,
            MedicalRecordUpdate {
                is_verified: Some(true),
                ..Default::default()
            },
        )
    }

    /// Removes a record and appends one `record_deleted` audit row.
    pub fn delete_medical_record(&mut self, id: &EntityId) -> StoreResult<()> {
        let pos = self
            .state
            .medical_records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found("medical record", id))?;
        let record = self.state.medical_records.remove(pos);

        let actor = self.cfg.user_id().to_owned();
        self.audit(
            &record.patient_id,
            &actor,
            AuditAction::RecordDeleted,
            id,
            format!("record '{}' deleted", record.title),
        );
        self.persist();

        tracing::info!("medical record {} deleted", id);
        Ok(())
    }

    /// Records of one patient, newest first, optionally of a single type.
    pub fn records_for_patient(
        &self,
        patient_id: &str,
        record_type: Option<RecordType>,
    ) -> Vec<&MedicalRecord> {
        let mut records: Vec<&MedicalRecord> = self
            .state
            .medical_records
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .filter(|r| record_type.map_or(true, |t| r.record_type == t))
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records
    }

    pub fn medical_records(&self) -> &[MedicalRecord] {
        &self.state.medical_records
    }

    pub fn audit_logs(&self) -> &[AuditLog] {
        &self.state.audit_logs
    }
}

// ============================================================================
// ACCESS GRANTS
// ============================================================================

impl EnhancedStore {
    pub fn request_access(&mut self, new: NewAccessRequest) -> StoreResult<EntityId> {
        NonEmptyText::new(&new.requester_id)?;
        let id = self.ids.next(ACCESS_PREFIX);

        self.state.access_requests.push(MedicalFileAccess {
            id: id.clone(),
            patient_id: new.patient_id.clone(),
            requester_id: new.requester_id.clone(),
            requester_name: new.requester_name.clone(),
            requester_type: new.requester_type,
            reason: new.reason,
            status: AccessStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            valid_until: None,
        });
        self.audit(
            &new.patient_id,
            &new.requester_id,
            AuditAction::AccessRequested,
            &id,
            format!("{} requested access", new.requester_name),
        );
        self.persist();
        Ok(id)
    }

    /// Moves a grant from `from` to `to`, stamping `responded_at` and auditing the change.
    fn transition_access(
        &mut self,
        id: &EntityId,
        from: AccessStatus,
        to: AccessStatus,
        action: AuditAction,
        valid_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let grant = self
            .state
            .access_requests
            .iter_mut()
            .find(|g| &g.id == id)
            .ok_or_else(|| StoreError::not_found("access request", id))?;

        if grant.status != from {
            return Err(StoreError::InvalidTransition {
                kind: "access request",
                from: grant.status.as_str().into(),
                to: to.as_str().into(),
            });
        }

        grant.status = to;
        grant.responded_at = Some(Utc::now());
        if valid_until.is_some() {
            grant.valid_until = valid_until;
        }
        let patient_id = grant.patient_id.clone();
        let requester = grant.requester_name.clone();

        self.audit(
            &patient_id,
            &patient_id,
            action,
            id,
            format!("access for {requester} {}", to.as_str()),
        );
        self.persist();

        tracing::info!("access request {} is now {}", id, to.as_str());
        Ok(())
    }

    pub fn approve_access(
        &mut self,
        id: &EntityId,
        valid_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        self.transition_access(
            id,
            AccessStatus::Pending,
            AccessStatus::Approved,
            AuditAction::AccessApproved,
            valid_until,
        )
    }

    pub fn deny_access(&mut self, id: &EntityId) -> StoreResult<()> {
        self.transition_access(
            id,
            AccessStatus::Pending,
            AccessStatus::Denied,
            AuditAction::AccessDenied,
            None,
        )
    }

    pub fn revoke_access(&mut self, id: &EntityId) -> StoreResult<()> {
        self.transition_access(
            id,
            AccessStatus::Approved,
            AccessStatus::Revoked,
            AuditAction::AccessRevoked,
            None,
        )
    }

    /// True when `requester_id` holds an approved, unexpired grant on the patient's file.
    pub fn has_active_access(&self, patient_id: &str, requester_id: &str, now: DateTime<Utc>) -> bool {
        self.state.access_requests.iter().any(|g| {
            g.patient_id == patient_id
                && g.requester_id == requester_id
                && g.status == AccessStatus::Approved
                && g.valid_until.map_or(true, |until| until > now)
        })
    }

    pub fn access_requests(&self) -> &[MedicalFileAccess] {
        &self.state.access_requests
    }
}

// ============================================================================
// CHRONIC CONDITIONS
// ============================================================================

impl EnhancedStore {
    pub fn add_chronic_condition(&mut self, new: NewChronicCondition) -> StoreResult<EntityId> {
        let name = NonEmptyText::new(&new.name)?;
        let id = self.ids.next(CONDITION_PREFIX);

        self.state.chronic_conditions.push(ChronicCondition {
            id: id.clone(),
            patient_id: new.patient_id,
            name: name.into_inner(),
            diagnosed_date: new.diagnosed_date,
            status: new.status,
            severity: new.severity,
            treatment_plan: new.treatment_plan,
            medications: new.medications,
            next_checkup: new.next_checkup,
            notes: new.notes,
            updated_at: Utc::now(),
        });
        self.persist();
        Ok(id)
    }

    pub fn update_chronic_condition(
        &mut self,
        id: &EntityId,
        update: ChronicConditionUpdate,
    ) -> StoreResult<()> {
        let condition = self
            .state
            .chronic_conditions
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::not_found("chronic condition", id))?;

        if let Some(status) = update.status {
            condition.status = status;
        }
        if let Some(severity) = update.severity {
            condition.severity = severity;
        }
        if let Some(plan) = update.treatment_plan {
            condition.treatment_plan = plan;
        }
        if let Some(medications) = update.medications {
            condition.medications = medications;
        }
        if let Some(next_checkup) = update.next_checkup {
            condition.next_checkup = next_checkup;
        }
        if let Some(notes) = update.notes {
            condition.notes = Some(notes);
        }
        condition.updated_at = Utc::now();

        self.persist();
        Ok(())
    }

    pub fn remove_chronic_condition(&mut self, id: &EntityId) -> StoreResult<()> {
        let before = self.state.chronic_conditions.len();
        self.state.chronic_conditions.retain(|c| &c.id != id);
        if self.state.chronic_conditions.len() == before {
            return Err(StoreError::not_found("chronic condition", id));
        }
        self.persist();
        Ok(())
    }

    /// Conditions with a check-up between `today` and `today + within_days`, soonest first.
    pub fn upcoming_checkups(&self, today: NaiveDate, within_days: u64) -> Vec<&ChronicCondition> {
        let horizon = today
            .checked_add_days(Days::new(within_days))
            .unwrap_or(NaiveDate::MAX);
        let mut due: Vec<&ChronicCondition> = self
            .state
            .chronic_conditions
            .iter()
            .filter(|c| matches!(c.next_checkup, Some(d) if d >= today && d <= horizon))
            .collect();
        due.sort_by_key(|c| c.next_checkup);
        due
    }

    pub fn chronic_conditions(&self) -> &[ChronicCondition] {
        &self.state.chronic_conditions
    }
}

// ============================================================================
// FAMILY MEMBERS
// ============================================================================

impl EnhancedStore {
    /// Adds a dependant. `is_adult` is computed against `today` and not refreshed later.
    pub fn add_family_member(
        &mut self,
        new: NewFamilyMember,
        today: NaiveDate,
    ) -> StoreResult<EntityId> {
        let name = NonEmptyText::new(&new.name)?;
        if new.date_of_birth > today {
            return Err(StoreError::InvalidInput(
                "date of birth is in the future".into(),
            ));
        }
        let now = Utc::now();
        let id = self.ids.next(FAMILY_PREFIX);

        self.state.family_members.push(FamilyMember {
            id: id.clone(),
            head_user_id: new.head_user_id,
            name: name.into_inner(),
            relationship: new.relationship,
            date_of_birth: new.date_of_birth,
            gender: new.gender,
            blood_type: new.blood_type,
            allergies: new.allergies,
            chronic_conditions: new.chronic_conditions,
            phone: new.phone,
            is_adult: age_on(new.date_of_birth, today) >= ADULT_AGE_YEARS,
            created_at: now,
            updated_at: now,
        });
        self.persist();

        tracing::info!("family member {} added", id);
        Ok(id)
    }

    /// Applies an update and recomputes `is_adult` against `today`.
    pub fn update_family_member(
        &mut self,
        id: &EntityId,
        update: FamilyMemberUpdate,
        today: NaiveDate,
    ) -> StoreResult<()> {
        let member = self
            .state
            .family_members
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| StoreError::not_found("family member", id))?;

        if let Some(name) = update.name {
            member.name = NonEmptyText::new(&name)?.into_inner();
        }
        if let Some(relationship) = update.relationship {
            member.relationship = relationship;
        }
        if let Some(dob) = update.date_of_birth {
            member.date_of_birth = dob;
        }
        if let Some(blood_type) = update.blood_type {
            member.blood_type = blood_type;
        }
        if let Some(allergies) = update.allergies {
            member.allergies = allergies;
        }
        if let Some(conditions) = update.chronic_conditions {
            member.chronic_conditions = conditions;
        }
        if let Some(phone) = update.phone {
            member.phone = phone;
        }
        member.is_adult = age_on(member.date_of_birth, today) >= ADULT_AGE_YEARS;
        member.updated_at = Utc::now();

        self.persist();
        Ok(())
    }

    /// Removes a member. Callers that must protect booked members check appointments first.
    pub fn remove_family_member(&mut self, id: &EntityId) -> StoreResult<FamilyMember> {
        let pos = self
            .state
            .family_members
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| StoreError::not_found("family member", id))?;
        let member = self.state.family_members.remove(pos);
        if self.selected_family_member.as_ref() == Some(id) {
            self.selected_family_member = None;
        }
        self.persist();

        tracing::info!("family member {} removed", id);
        Ok(member)
    }

    pub fn family_member(&self, id: &EntityId) -> Option<&FamilyMember> {
        self.state.family_members.iter().find(|m| &m.id == id)
    }

    pub fn family_members_of<'a>(
        &'a self,
        head_user_id: &'a str,
    ) -> impl Iterator<Item = &'a FamilyMember> + 'a {
        self.state
            .family_members
            .iter()
            .filter(move |m| m.head_user_id == head_user_id)
    }
}

// ============================================================================
// MEDICATION REMINDERS AND DOSE LOGS
// ============================================================================

fn same_medication(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl EnhancedStore {
    /// Adds a reminder.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateActiveReminder`] when the patient already has an active
    /// reminder for the same medication name. Nothing is stored in that case.
    pub fn add_medication_reminder(
        &mut self,
        new: NewMedicationReminder,
    ) -> StoreResult<EntityId> {
        let medication = NonEmptyText::new(&new.medication_name)?;

        if self.state.medication_reminders.iter().any(|r| {
            r.is_active
                && r.patient_id == new.patient_id
                && same_medication(&r.medication_name, medication.as_str())
        }) {
            return Err(StoreError::DuplicateActiveReminder {
                medication: medication.into_inner(),
            });
        }

        let now = Utc::now();
        let id = self.ids.next(REMINDER_PREFIX);
        self.state.medication_reminders.push(MedicationReminder {
            id: id.clone(),
            patient_id: new.patient_id,
            family_member_id: new.family_member_id,
            medication_name: medication.into_inner(),
            dosage: new.dosage,
            frequency: new.frequency,
            times: new.times,
            start_date: new.start_date,
            end_date: new.end_date,
            instructions: new.instructions,
            total_quantity: new.total_quantity,
            remaining_quantity: new.total_quantity,
            refill_threshold: new.refill_threshold,
            is_active: true,
            auto_refill: new.auto_refill,
            created_at: now,
            updated_at: now,
        });
        self.persist();

        tracing::info!("medication reminder {} added", id);
        Ok(id)
    }

    fn reminder_mut(&mut self, id: &EntityId) -> StoreResult<&mut MedicationReminder> {
        self.state
            .medication_reminders
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found("medication reminder", id))
    }

    pub fn update_medication_reminder(
        &mut self,
        id: &EntityId,
        update: MedicationReminderUpdate,
    ) -> StoreResult<()> {
        let reminder = self.reminder_mut(id)?;
        if let Some(dosage) = update.dosage {
            reminder.dosage = dosage;
        }
        if let Some(frequency) = update.frequency {
            reminder.frequency = frequency;
        }
        if let Some(times) = update.times {
            reminder.times = times;
        }
        if let Some(end_date) = update.end_date {
            reminder.end_date = end_date;
        }
        if let Some(instructions) = update.instructions {
            reminder.instructions = Some(instructions);
        }
        if let Some(threshold) = update.refill_threshold {
            reminder.refill_threshold = threshold;
        }
        if let Some(auto_refill) = update.auto_refill {
            reminder.auto_refill = auto_refill;
        }
        reminder.updated_at = Utc::now();

        self.persist();
        Ok(())
    }

    /// Pauses or resumes a reminder. Resuming is subject to the duplicate rule.
    pub fn set_reminder_active(&mut self, id: &EntityId, active: bool) -> StoreResult<()> {
        if active {
            let target = self
                .state
                .medication_reminders
                .iter()
                .find(|r| &r.id == id)
                .ok_or_else(|| StoreError::not_found("medication reminder", id))?;
            let clash = self.state.medication_reminders.iter().any(|r| {
                &r.id != id
                    && r.is_active
                    && r.patient_id == target.patient_id
                    && same_medication(&r.medication_name, &target.medication_name)
            });
            if clash {
                return Err(StoreError::DuplicateActiveReminder {
                    medication: target.medication_name.clone(),
                });
            }
        }

        let reminder = self.reminder_mut(id)?;
        reminder.is_active = active;
        reminder.updated_at = Utc::now();
        self.persist();
        Ok(())
    }

    pub fn delete_medication_reminder(&mut self, id: &EntityId) -> StoreResult<()> {
        let before = self.state.medication_reminders.len();
        self.state.medication_reminders.retain(|r| &r.id != id);
        if self.state.medication_reminders.len() == before {
            return Err(StoreError::not_found("medication reminder", id));
        }
        self.persist();
        Ok(())
    }

    /// Adds `quantity` units to the remaining stock.
    pub fn refill_medication(&mut self, id: &EntityId, quantity: u32) -> StoreResult<()> {
        let reminder = self.reminder_mut(id)?;
        reminder.remaining_quantity = reminder.remaining_quantity.saturating_add(quantity);
        reminder.total_quantity = reminder.total_quantity.max(reminder.remaining_quantity);
        reminder.updated_at = Utc::now();
        self.persist();
        Ok(())
    }

    fn push_dose_log(
        &mut self,
        reminder_id: &EntityId,
        scheduled_time: DateTime<Utc>,
        status: DoseStatus,
        snooze_until: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> EntityId {
        let id = self.ids.next(DOSE_LOG_PREFIX);
        self.state.medication_logs.push(MedicationLog {
            id: id.clone(),
            reminder_id: reminder_id.clone(),
            scheduled_time,
            taken_at: (status == DoseStatus::Taken).then(Utc::now),
            status,
            snooze_until,
            notes,
        });
        id
    }

    /// Logs a taken dose and decrements the remaining stock, never below zero.
    pub fn log_medication_taken(
        &mut self,
        reminder_id: &EntityId,
        scheduled_time: DateTime<Utc>,
        notes: Option<String>,
    ) -> StoreResult<EntityId> {
        let reminder = self.reminder_mut(reminder_id)?;
        reminder.remaining_quantity = reminder.remaining_quantity.saturating_sub(1);
        reminder.updated_at = Utc::now();

        let id = self.push_dose_log(reminder_id, scheduled_time, DoseStatus::Taken, None, notes);
        self.persist();
        Ok(id)
    }

    pub fn log_medication_skipped(
        &mut self,
        reminder_id: &EntityId,
        scheduled_time: DateTime<Utc>,
        notes: Option<String>,
    ) -> StoreResult<EntityId> {
        self.reminder_mut(reminder_id)?;
        let id = self.push_dose_log(reminder_id, scheduled_time, DoseStatus::Skipped, None, notes);
        self.persist();
        Ok(id)
    }

    pub fn snooze_medication(
        &mut self,
        reminder_id: &EntityId,
        scheduled_time: DateTime<Utc>,
        minutes: u32,
    ) -> StoreResult<EntityId> {
        self.reminder_mut(reminder_id)?;
        let until = Utc::now() + chrono::Duration::minutes(i64::from(minutes));
        let id = self.push_dose_log(
            reminder_id,
            scheduled_time,
            DoseStatus::Snoozed,
            Some(until),
            None,
        );
        self.persist();
        Ok(id)
    }

    pub fn reminder(&self, id: &EntityId) -> Option<&MedicationReminder> {
        self.state.medication_reminders.iter().find(|r| &r.id == id)
    }

    pub fn medication_reminders(&self) -> &[MedicationReminder] {
        &self.state.medication_reminders
    }

    pub fn logs_for_reminder<'a>(
        &'a self,
        reminder_id: &'a EntityId,
    ) -> impl Iterator<Item = &'a MedicationLog> + 'a {
        self.state
            .medication_logs
            .iter()
            .filter(move |l| &l.reminder_id == reminder_id)
    }

    /// Active reminders whose stock is at or below the refill threshold.
    pub fn reminders_needing_refill(&self) -> Vec<&MedicationReminder> {
        self.state
            .medication_reminders
            .iter()
            .filter(|r| r.is_active && r.needs_refill())
            .collect()
    }

    /// Share of decided doses that were taken, or `None` before any dose is decided.
    pub fn adherence_rate(&self, reminder_id: &EntityId) -> Option<f64> {
        let (taken, skipped) =
            self.logs_for_reminder(reminder_id)
                .fold((0u32, 0u32), |(t, s), log| match log.status {
                    DoseStatus::Taken => (t + 1, s),
                    DoseStatus::Skipped => (t, s + 1),
                    _ => (t, s),
                });
        let decided = taken + skipped;
        (decided > 0).then(|| f64::from(taken) / f64::from(decided))
    }
}

// ============================================================================
// FOLLOW-UPS
// ============================================================================

impl EnhancedStore {
    pub fn create_follow_up(&mut self, new: NewFollowUp) -> EntityId {
        let id = self.ids.next(FOLLOW_UP_PREFIX);
        self.state.follow_ups.push(PostVisitFollowUp {
            id: id.clone(),
            appointment_id: new.appointment_id,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            visit_date: new.visit_date,
            scheduled_for: new.scheduled_for,
            questions: new.questions,
            patient_response: None,
            response_notes: None,
            responded_at: None,
            status: FollowUpStatus::PendingResponse,
            doctor_notes: None,
            completed_at: None,
            created_at: Utc::now(),
        });
        self.persist();

        tracing::info!("follow-up {} created", id);
        id
    }

    fn follow_up_mut(&mut self, id: &EntityId) -> StoreResult<&mut PostVisitFollowUp> {
        self.state
            .follow_ups
            .iter_mut()
            .find(|f| &f.id == id)
            .ok_or_else(|| StoreError::not_found("follow-up", id))
    }

    /// Records the patient's answer. A `worsened` answer escalates the follow-up.
    pub fn submit_follow_up_response(
        &mut self,
        id: &EntityId,
        response: PatientResponse,
        notes: Option<String>,
    ) -> StoreResult<FollowUpStatus> {
        let follow_up = self.follow_up_mut(id)?;
        let status = FollowUpStatus::from(response);
        if follow_up.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                kind: "follow-up",
                from: follow_up.status.as_str().into(),
                to: status.as_str().into(),
            });
        }

        follow_up.patient_response = Some(response);
        follow_up.response_notes = notes;
        follow_up.responded_at = Some(Utc::now());
        follow_up.status = status;
        self.persist();

        if status == FollowUpStatus::Escalated {
            tracing::warn!("follow-up {} escalated", id);
        }
        Ok(status)
    }

    /// Doctor closes the follow-up.
    pub fn complete_follow_up(
        &mut self,
        id: &EntityId,
        doctor_notes: Option<String>,
    ) -> StoreResult<()> {
        let follow_up = self.follow_up_mut(id)?;
        if follow_up.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                kind: "follow-up",
                from: follow_up.status.as_str().into(),
                to: FollowUpStatus::Completed.as_str().into(),
            });
        }
        follow_up.status = FollowUpStatus::Completed;
        follow_up.doctor_notes = doctor_notes;
        follow_up.completed_at = Some(Utc::now());
        self.persist();
        Ok(())
    }

    /// Marks an unanswered follow-up as timed out.
    pub fn mark_follow_up_no_response(&mut self, id: &EntityId) -> StoreResult<()> {
        let follow_up = self.follow_up_mut(id)?;
        if follow_up.status != FollowUpStatus::PendingResponse {
            return Err(StoreError::InvalidTransition {
                kind: "follow-up",
                from: follow_up.status.as_str().into(),
                to: FollowUpStatus::NoResponse.as_str().into(),
            });
        }
        follow_up.status = FollowUpStatus::NoResponse;
        self.persist();
        Ok(())
    }

    pub fn follow_up(&self, id: &EntityId) -> Option<&PostVisitFollowUp> {
        self.state.follow_ups.iter().find(|f| &f.id == id)
    }

    pub fn pending_follow_ups<'a>(
        &'a self,
        patient_id: &'a str,
    ) -> impl Iterator<Item = &'a PostVisitFollowUp> + 'a {
        self.state.follow_ups.iter().filter(move |f| {
            f.patient_id == patient_id && f.status == FollowUpStatus::PendingResponse
        })
    }

    pub fn send_follow_up_message(
        &mut self,
        follow_up_id: &EntityId,
        sender: MessageSender,
        text: &str,
    ) -> StoreResult<EntityId> {
        let text = NonEmptyText::new(text)?;
        if self.follow_up(follow_up_id).is_none() {
            return Err(StoreError::not_found("follow-up", follow_up_id));
        }

        let id = self.ids.next(FOLLOW_UP_MESSAGE_PREFIX);
        self.state.follow_up_messages.push(FollowUpMessage {
            id: id.clone(),
            follow_up_id: follow_up_id.clone(),
            sender,
            text: text.into_inner(),
            is_read: false,
            created_at: Utc::now(),
        });
        self.persist();
        Ok(id)
    }

    /// Marks every message in the thread not sent by `reader` as read. Returns how many changed.
    pub fn mark_follow_up_messages_read(
        &mut self,
        follow_up_id: &EntityId,
        reader: MessageSender,
    ) -> usize {
        let mut changed = 0;
        for message in self
            .state
            .follow_up_messages
            .iter_mut()
            .filter(|m| &m.follow_up_id == follow_up_id && m.sender != reader && !m.is_read)
        {
            message.is_read = true;
            changed += 1;
        }
        if changed > 0 {
            self.persist();
        }
        changed
    }

    pub fn messages_for_follow_up<'a>(
        &'a self,
        follow_up_id: &'a EntityId,
    ) -> impl Iterator<Item = &'a FollowUpMessage> + 'a {
        self.state
            .follow_up_messages
            .iter()
            .filter(move |m| &m.follow_up_id == follow_up_id)
    }
}
