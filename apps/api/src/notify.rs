//! Outbound notification hooks.
//!
//! Delivery is simulated: `LogNotifier` writes the SMS it would have sent to
//! the structured log. Callers treat a hook error as a warning, never as a
//! reason to undo the state change that triggered it.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::models::HelpRequest;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called after a pending request is persisted. Alerts the supervisor.
    async fn on_request_created(&self, request: &HelpRequest) -> Result<()>;

    /// Called after a request is resolved. Follows up with the customer.
    async fn on_request_resolved(&self, request: &HelpRequest, answer: &str) -> Result<()>;
}

pub struct LogNotifier {
    supervisor_phone: String,
    dashboard_url: String,
}

impl LogNotifier {
    pub fn new(supervisor_phone: String, dashboard_url: String) -> Self {
        Self {
            supervisor_phone,
            dashboard_url: dashboard_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_request_created(&self, request: &HelpRequest) -> Result<()> {
        info!(
            to = %self.supervisor_phone,
            request_id = %request.id,
            "Simulated SMS to supervisor:\n{}",
            supervisor_message(request, &self.dashboard_url)
        );
        Ok(())
    }

    async fn on_request_resolved(&self, request: &HelpRequest, answer: &str) -> Result<()> {
        info!(
            to = %request.customer_phone,
            request_id = %request.id,
            "Simulated SMS to customer:\n{}",
            customer_message(request, answer)
        );
        Ok(())
    }
}

pub fn supervisor_message(request: &HelpRequest, dashboard_url: &str) -> String {
    format!(
        "HELP NEEDED\nQuestion: {}\nCustomer: {}\nRequest ID: {}\n\nReply at: {}/api/v1/requests/{}",
        request.question, request.customer_phone, request.id, dashboard_url, request.id
    )
}

pub fn customer_message(request: &HelpRequest, answer: &str) -> String {
    format!(
        "Hi! Following up on your question about '{}'. Here's the answer: {}",
        request.question, answer
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HelpRequest {
        HelpRequest::new("+15550009".into(), "Do you sell wax?".into(), None)
    }

    #[test]
    fn test_supervisor_message_links_request() {
        let req = request();
        let msg = supervisor_message(&req, "http://desk.local");
        assert!(msg.starts_with("HELP NEEDED"));
        assert!(msg.contains("Customer: +15550009"));
        assert!(msg.ends_with(&format!("http://desk.local/api/v1/requests/{}", req.id)));
    }

    #[test]
    fn test_customer_message_quotes_question_and_answer() {
        let msg = customer_message(&request(), "Yes, two brands.");
        assert_eq!(
            msg,
            "Hi! Following up on your question about 'Do you sell wax?'. Here's the answer: Yes, two brands."
        );
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier::new("+1234567890".into(), "http://localhost:8080/".into());
        let req = request();
        assert!(notifier.on_request_created(&req).await.is_ok());
        assert!(notifier.on_request_resolved(&req, "yes").await.is_ok());
    }
}
