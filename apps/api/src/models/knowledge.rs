use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamp, Record};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    Supervisor,
    Ai,
    Seed,
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeSource::Supervisor => "supervisor",
            KnowledgeSource::Ai => "ai",
            KnowledgeSource::Seed => "seed",
        }
    }
}

impl fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supervisor" => Ok(KnowledgeSource::Supervisor),
            "ai" => Ok(KnowledgeSource::Ai),
            "seed" => Ok(KnowledgeSource::Seed),
            other => Err(format!("unknown knowledge source '{other}'")),
        }
    }
}

/// A question/answer pair usable for automatic answering.
/// `question` and `answer` hold markup-escaped text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeBaseEntry {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub source: KnowledgeSource,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(with = "timestamp")]
    pub last_used: DateTime<Utc>,
}

impl KnowledgeBaseEntry {
    pub fn new(question: String, answer: String, source: KnowledgeSource) -> Self {
        let now = timestamp::now();
        Self {
            id: Uuid::new_v4(),
            question,
            answer,
            source,
            created_at: now,
            usage_count: 0,
            last_used: now,
        }
    }
}

impl Record for KnowledgeBaseEntry {
    fn check(&self) -> Result<(), String> {
        if self.last_used < self.created_at {
            return Err("last_used precedes created_at".to_string());
        }
        Ok(())
    }
}
