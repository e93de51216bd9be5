//! Glue between the two stores and the notification hooks: answer from the
//! knowledge base when possible, otherwise escalate; fold supervisor answers
//! back into the knowledge base.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::knowledge::KnowledgeStore;
use crate::models::{HelpRequest, KnowledgeBaseEntry, KnowledgeSource};
use crate::notify::Notifier;
use crate::requests::RequestStore;
use crate::store::StoreError;

const DASHBOARD_PREVIEW: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskOutcome {
    Answered { answer: String },
    Escalated { request: HelpRequest },
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub pending: usize,
    pub resolved: usize,
    pub knowledge_entries: usize,
    pub pending_requests: Vec<HelpRequest>,
    pub recent_resolved: Vec<HelpRequest>,
    pub recent_knowledge: Vec<KnowledgeBaseEntry>,
}

pub struct Escalation {
    knowledge: KnowledgeStore,
    requests: RequestStore,
    notifier: Arc<dyn Notifier>,
}

impl Escalation {
    pub fn new(
        knowledge: KnowledgeStore,
        requests: RequestStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            knowledge,
            requests,
            notifier,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub async fn ask(
        &self,
        customer_phone: &str,
        question: &str,
        context: Option<&str>,
    ) -> Result<AskOutcome, StoreError> {
        if let Some(answer) = self.knowledge.find_answer(question).await? {
            info!("Answered from knowledge base");
            return Ok(AskOutcome::Answered { answer });
        }
        let request = self.escalate(customer_phone, question, context).await?;
        Ok(AskOutcome::Escalated { request })
    }

    /// Creates a pending request and alerts the supervisor.
    pub async fn escalate(
        &self,
        customer_phone: &str,
        question: &str,
        context: Option<&str>,
    ) -> Result<HelpRequest, StoreError> {
        let request = self
            .requests
            .create_help_request(customer_phone, question, context)
            .await?;
        if let Err(e) = self.notifier.on_request_created(&request).await {
            warn!(request_id = %request.id, "Supervisor notification failed: {e:#}");
        }
        Ok(request)
    }

    /// Resolves the request, learns the answer, and follows up with the customer.
    /// Once the resolution is persisted the call succeeds; a failed knowledge
    /// write or notification is only logged.
    pub async fn resolve(&self, id: &str, answer: &str) -> Result<HelpRequest, StoreError> {
        let request = self.requests.resolve_request(id, answer).await?;
        if let Err(e) = self
            .knowledge
            .add_entry(&request.question, answer, KnowledgeSource::Supervisor)
            .await
        {
            warn!(request_id = %request.id, "Could not learn supervisor answer: {e}");
        }
        if let Err(e) = self.notifier.on_request_resolved(&request, answer).await {
            warn!(request_id = %request.id, "Customer notification failed: {e:#}");
        }
        Ok(request)
    }

    pub async fn retract(&self, id: &str) -> Result<HelpRequest, StoreError> {
        self.requests.mark_request_unresolved(id).await
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, StoreError> {
        let pending_requests = self.requests.get_pending_requests().await?;
        let resolved = self.requests.get_resolved_requests().await?;
        let knowledge = self.knowledge.get_all_entries().await?;

        Ok(DashboardSummary {
            pending: pending_requests.len(),
            resolved: resolved.len(),
            knowledge_entries: knowledge.len(),
            pending_requests,
            recent_resolved: resolved.into_iter().take(DASHBOARD_PREVIEW).collect(),
            recent_knowledge: knowledge.into_iter().take(DASHBOARD_PREVIEW).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;
    use crate::store::testing::FlakyBackend;
    use crate::store::{keys, KvBackend, MemoryBackend};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn on_request_created(&self, request: &HelpRequest) -> anyhow::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("created {}", request.id));
            if self.fail {
                anyhow::bail!("sms gateway down");
            }
            Ok(())
        }

        async fn on_request_resolved(
            &self,
            request: &HelpRequest,
            answer: &str,
        ) -> anyhow::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("resolved {} {answer}", request.id));
            if self.fail {
                anyhow::bail!("sms gateway down");
            }
            Ok(())
        }
    }

    fn desk(fail: bool) -> (Arc<RecordingNotifier>, Escalation) {
        desk_on(Arc::new(MemoryBackend::new()), fail)
    }

    fn desk_on(backend: Arc<dyn KvBackend>, fail: bool) -> (Arc<RecordingNotifier>, Escalation) {
        let notifier = Arc::new(RecordingNotifier {
            fail,
            ..Default::default()
        });
        let desk = Escalation::new(
            KnowledgeStore::new(backend.clone()),
            RequestStore::new(backend),
            notifier.clone(),
        );
        (notifier, desk)
    }

    #[tokio::test]
    async fn test_miss_escalates_then_resolution_is_learned() {
        let (notifier, desk) = desk(false);

        let request = match desk
            .ask("+15550001", "Do you offer keratin treatments?", None)
            .await
            .unwrap()
        {
            AskOutcome::Escalated { request } => request,
            other => panic!("expected escalation, got {other:?}"),
        };
        assert_eq!(request.status, RequestStatus::Pending);

        let resolved = desk
            .resolve(&request.id.to_string(), "Yes, on weekdays")
            .await
            .unwrap();
        assert_eq!(resolved.status, RequestStatus::Resolved);

        match desk
            .ask("+15550002", "do you offer keratin treatments?", None)
            .await
            .unwrap()
        {
            AskOutcome::Answered { answer } => assert_eq!(answer, "Yes, on weekdays"),
            other => panic!("expected answer, got {other:?}"),
        }

        let events = notifier.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                format!("created {}", request.id),
                format!("resolved {} Yes, on weekdays", request.id),
            ]
        );
    }

    #[tokio::test]
    async fn test_hook_failure_keeps_state() {
        let (notifier, desk) = desk(true);

        let request = desk.escalate("+1", "Are you open Sunday?", None).await.unwrap();
        let id = request.id.to_string();
        assert_eq!(
            desk.requests().get_help_request(&id).await.unwrap().status,
            RequestStatus::Pending
        );

        desk.resolve(&id, "No").await.unwrap();
        assert_eq!(
            desk.requests().get_help_request(&id).await.unwrap().status,
            RequestStatus::Resolved
        );
        assert_eq!(notifier.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_learning_still_resolves_and_notifies() {
        let (notifier, desk) = desk_on(
            Arc::new(FlakyBackend::rejecting_writes_to(keys::KNOWLEDGE_PREFIX)),
            false,
        );
        let request = desk.escalate("+1", "Are you open Sunday?", None).await.unwrap();
        let id = request.id.to_string();

        let resolved = desk.resolve(&id, "No").await.unwrap();
        assert_eq!(resolved.status, RequestStatus::Resolved);
        assert_eq!(
            desk.requests().get_help_request(&id).await.unwrap().status,
            RequestStatus::Resolved
        );
        assert_eq!(
            notifier.events.lock().unwrap().last(),
            Some(&format!("resolved {id} No"))
        );
        assert!(desk.knowledge().get_all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolving_unknown_request_notifies_nobody() {
        let (notifier, desk) = desk(false);
        let err = desk
            .resolve(&uuid::Uuid::new_v4().to_string(), "answer")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(notifier.events.lock().unwrap().is_empty());
        assert!(desk.knowledge().get_all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let (_, desk) = desk(false);
        let a = desk.escalate("+1", "a?", None).await.unwrap();
        desk.escalate("+2", "b?", None).await.unwrap();
        desk.resolve(&a.id.to_string(), "A").await.unwrap();

        let summary = desk.dashboard().await.unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.knowledge_entries, 1);
        assert_eq!(summary.recent_resolved[0].id, a.id);
    }
}
