//! Medical-AI store.
//!
//! Holds assistant conversations and the cached health insights. Conversations and dismissed
//! alert keys are persisted; the insight caches are rebuilt by [`AssistantStore::refresh_insights`]
//! and never reach storage.

use crate::assistant::{self, AssistantContext, Reply};
use crate::catalog;
use crate::config::CoreConfig;
use crate::constants::{AI_MESSAGE_PREFIX, ASSISTANT_SLICE, CONVERSATION_PREFIX};
use crate::error::{StoreError, StoreResult};
use crate::models::assistant::*;
use crate::persistence::{load_slice, save_slice, PersistedSlice, SliceStorage};
use chrono::{DateTime, Utc};
use sehati_ids::{EntityId, IdGenerator};
use sehati_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Persisted fields of the assistant store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSlice {
    pub conversations: Vec<AIConversation>,
    pub active_conversation_id: Option<EntityId>,
    pub dismissed_alerts: BTreeSet<String>,
}

impl PersistedSlice for AssistantSlice {
    const NAME: &'static str = ASSISTANT_SLICE;
}

pub struct AssistantStore {
    cfg: Arc<CoreConfig>,
    storage: Arc<dyn SliceStorage>,
    ids: IdGenerator,
    state: AssistantSlice,
    lab_results: Vec<LabResult>,
    is_typing: bool,
    health_risks: Vec<HealthRisk>,
    health_alerts: Vec<HealthAlert>,
    recommendations: Vec<LifestyleRecommendation>,
    insights_refreshed_at: Option<DateTime<Utc>>,
}

impl AssistantStore {
    pub fn open(cfg: Arc<CoreConfig>, storage: Arc<dyn SliceStorage>) -> Self {
        let state = load_slice::<AssistantSlice>(storage.as_ref());
        Self {
            cfg,
            storage,
            ids: IdGenerator::new(),
            state,
            lab_results: catalog::latest_lab_results(),
            is_typing: false,
            health_risks: Vec::new(),
            health_alerts: Vec::new(),
            recommendations: Vec::new(),
            insights_refreshed_at: None,
        }
    }

    fn persist(&self) {
        save_slice(self.storage.as_ref(), &self.state);
    }

    pub fn snapshot(&self) -> &AssistantSlice {
        &self.state
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn lab_results(&self) -> &[LabResult] {
        &self.lab_results
    }

    fn message(&mut self, role: MessageRole, reply: Reply) -> AIMessage {
        AIMessage {
            id: self.ids.next(AI_MESSAGE_PREFIX),
            role,
            content: reply.content,
            message_type: reply.message_type,
            suggested_actions: reply.suggested_actions,
            has_disclaimer: reply.has_disclaimer,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// CONVERSATIONS
// ============================================================================

impl AssistantStore {
    /// Opens a new conversation with a welcome message and makes it active.
    pub fn start_conversation(&mut self) -> EntityId {
        let now = Utc::now();
        let id = self.ids.next(CONVERSATION_PREFIX);
        let welcome = self.message(MessageRole::Assistant, assistant::welcome());

        self.state.conversations.push(AIConversation {
            id: id.clone(),
            patient_id: self.cfg.user_id().to_owned(),
            messages: vec![welcome],
            started_at: now,
            updated_at: now,
        });
        self.state.active_conversation_id = Some(id.clone());
        self.persist();

        tracing::info!("assistant conversation {} started", id);
        id
    }

    fn active_mut(&mut self) -> Option<&mut AIConversation> {
        let id = self.state.active_conversation_id.clone()?;
        self.state.conversations.iter_mut().find(|c| c.id == id)
    }

    /// Appends the user's message, waits the typing delay, then appends the reply.
    ///
    /// Starts a conversation first if none is active.
    pub async fn send_message(
        &mut self,
        text: &str,
        ctx: &AssistantContext<'_>,
    ) -> StoreResult<AIMessage> {
        let text = NonEmptyText::new(text)?;
        if self.active_mut().is_none() {
            self.start_conversation();
        }

        let user = self.message(
            MessageRole::User,
            Reply {
                content: text.as_str().to_owned(),
                message_type: MessageType::Text,
                suggested_actions: Vec::new(),
                has_disclaimer: false,
            },
        );
        self.push_to_active(user)?;

        self.is_typing = true;
        tokio::time::sleep(self.cfg.simulated_delay() / 2).await;
        let reply = assistant::respond(text.as_str(), &self.lab_results, ctx);
        let reply = self.message(MessageRole::Assistant, reply);
        self.is_typing = false;

        self.push_to_active(reply.clone())?;
        Ok(reply)
    }

    fn push_to_active(&mut self, message: AIMessage) -> StoreResult<()> {
        let conversation = self
            .active_mut()
            .ok_or_else(|| StoreError::not_found("conversation", "active"))?;
        conversation.updated_at = message.created_at;
        conversation.messages.push(message);
        self.persist();
        Ok(())
    }

    /// Drops the active conversation. The next message starts a fresh one.
    pub fn clear_conversation(&mut self) {
        if let Some(id) = self.state.active_conversation_id.take() {
            self.state.conversations.retain(|c| c.id != id);
            tracing::info!("assistant conversation {} cleared", id);
        }
        self.persist();
    }

    pub fn active_conversation(&self) -> Option<&AIConversation> {
        let id = self.state.active_conversation_id.as_ref()?;
        self.state.conversations.iter().find(|c| &c.id == id)
    }

    pub fn conversations(&self) -> &[AIConversation] {
        &self.state.conversations
    }

    pub fn analyze_lab_results(&self) -> LabAnalysis {
        assistant::lab::analyze_lab_results(&self.lab_results)
    }

    pub fn assess_symptoms(&self, text: &str) -> SymptomAssessment {
        assistant::symptoms::assess_symptoms(text)
    }
}

// ============================================================================
// INSIGHTS
// ============================================================================

impl AssistantStore {
    /// Recomputes risks, alerts and recommendations. Dismissed alerts are filtered out.
    pub fn refresh_insights(&mut self, ctx: &AssistantContext<'_>) {
        let risks = assistant::insights::health_risks(&self.lab_results, ctx);
        let alerts = assistant::insights::health_alerts(&self.lab_results, ctx);

        self.recommendations = assistant::insights::lifestyle_recommendations(&risks);
        self.health_risks = risks;
        self.health_alerts = alerts
            .into_iter()
            .filter(|a| !self.state.dismissed_alerts.contains(&a.key))
            .collect();
        self.insights_refreshed_at = Some(Utc::now());

        tracing::debug!(
            "insights refreshed: {} risks, {} alerts",
            self.health_risks.len(),
            self.health_alerts.len()
        );
    }

    /// Hides an alert now and on every later refresh.
    pub fn dismiss_alert(&mut self, key: &str) -> bool {
        let before = self.health_alerts.len();
        self.health_alerts.retain(|a| a.key != key);
        let inserted = self.state.dismissed_alerts.insert(key.to_owned());
        if inserted {
            self.persist();
        }
        inserted || self.health_alerts.len() != before
    }

    pub fn health_risks(&self) -> &[HealthRisk] {
        &self.health_risks
    }

    pub fn health_alerts(&self) -> &[HealthAlert] {
        &self.health_alerts
    }

    pub fn recommendations(&self) -> &[LifestyleRecommendation] {
        &self.recommendations
    }

    pub fn insights_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.insights_refreshed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySliceStorage;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn cfg() -> Arc<CoreConfig> {
        Arc::new(CoreConfig::default().with_simulated_delay(Duration::ZERO))
    }

    fn ctx() -> AssistantContext<'static> {
        AssistantContext {
            appointments: &[],
            reminders: &[],
            conditions: &[],
            today: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_lab_question_gets_lab_analysis_with_disclaimer() {
        let mut store = AssistantStore::open(cfg(), Arc::new(MemorySliceStorage::new()));

        let reply = store.send_message("ما معنى نتائج التحاليل؟", &ctx()).await.unwrap();
        assert_eq!(reply.message_type, MessageType::LabAnalysis);
        assert!(reply.has_disclaimer);
        assert!(!store.is_typing());

        let conversation = store.active_conversation().unwrap();
        // welcome, user, reply
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[1].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let mut store = AssistantStore::open(cfg(), Arc::new(MemorySliceStorage::new()));
        assert!(store.send_message("   ", &ctx()).await.is_err());
        assert!(store.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_clear_then_send_starts_new_conversation() {
        let mut store = AssistantStore::open(cfg(), Arc::new(MemorySliceStorage::new()));
        let first = store.start_conversation();
        store.clear_conversation();
        assert!(store.active_conversation().is_none());

        store.send_message("hello", &ctx()).await.unwrap();
        let active = store.active_conversation().unwrap();
        assert_ne!(active.id, first);
        assert_eq!(store.conversations().len(), 1);
    }

    #[test]
    fn test_dismissed_alert_survives_refresh_and_reload() {
        let storage: Arc<dyn SliceStorage> = Arc::new(MemorySliceStorage::new());
        let mut store = AssistantStore::open(cfg(), storage.clone());
        store.refresh_insights(&ctx());
        assert!(store.health_alerts().iter().any(|a| a.key == "lab:ldl"));

        assert!(store.dismiss_alert("lab:ldl"));
        store.refresh_insights(&ctx());
        assert!(!store.health_alerts().iter().any(|a| a.key == "lab:ldl"));

        let mut reloaded = AssistantStore::open(cfg(), storage);
        assert!(reloaded.health_alerts().is_empty());
        assert!(reloaded.insights_refreshed_at().is_none());
        reloaded.refresh_insights(&ctx());
        assert!(!reloaded.health_alerts().iter().any(|a| a.key == "lab:ldl"));
        assert!(!reloaded.health_risks().is_empty());
    }
}
