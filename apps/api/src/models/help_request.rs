use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamp, Record};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Resolved,
    Unresolved,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Resolved => "resolved",
            RequestStatus::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An escalated customer question.
///
/// `resolved_at` and `supervisor_answer` are set exactly when `status` is
/// `Resolved`; the transition helpers below are the only way to change them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelpRequest {
    pub id: Uuid,
    pub customer_phone: String,
    pub question: String,
    #[serde(default)]
    pub context: Option<String>,
    pub status: RequestStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub supervisor_answer: Option<String>,
}

impl HelpRequest {
    pub fn new(customer_phone: String, question: String, context: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_phone,
            question,
            context,
            status: RequestStatus::Pending,
            created_at: timestamp::now(),
            resolved_at: None,
            supervisor_answer: None,
        }
    }

    /// Copy of this request in the resolved state. Never earlier than creation.
    pub fn resolved(&self, answer: &str, now: DateTime<Utc>) -> Self {
        Self {
            status: RequestStatus::Resolved,
            resolved_at: Some(now.max(self.created_at)),
            supervisor_answer: Some(answer.to_string()),
            ..self.clone()
        }
    }

    /// Copy of this request retracted to `Unresolved`, prior answer cleared.
    pub fn retracted(&self) -> Self {
        Self {
            status: RequestStatus::Unresolved,
            resolved_at: None,
            supervisor_answer: None,
            ..self.clone()
        }
    }
}

impl Record for HelpRequest {
    fn check(&self) -> Result<(), String> {
        let resolved = self.status == RequestStatus::Resolved;
        if resolved != self.resolved_at.is_some() || resolved != self.supervisor_answer.is_some() {
            return Err(format!(
                "status {} disagrees with resolution fields",
                self.status
            ));
        }
        if let Some(resolved_at) = self.resolved_at {
            if resolved_at < self.created_at {
                return Err("resolved_at precedes created_at".to_string());
            }
        }
        Ok(())
    }
}
