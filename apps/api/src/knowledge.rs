//! Knowledge Store: exact-match question lookup with usage accounting.
//!
//! Matching is equality after escaping, trimming and lower-casing. No fuzzy or
//! substring matching; a miss escalates to a supervisor instead of guessing.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::{decode, encode, timestamp, KnowledgeBaseEntry, KnowledgeSource};
use crate::sanitize::{escape_markup, normalize_question, question_key};
use crate::store::{keys, reconcile_index, require, IndexRepair, KvBackend, StoreError};

/// A pre-seeded fact, as read from `KNOWLEDGE_SEED_PATH`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedFact {
    pub question: String,
    pub answer: String,
}

#[derive(Clone)]
pub struct KnowledgeStore {
    backend: Arc<dyn KvBackend>,
}

impl KnowledgeStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Escapes both texts and persists a fresh entry.
    pub async fn add_entry(
        &self,
        question: &str,
        answer: &str,
        source: KnowledgeSource,
    ) -> Result<KnowledgeBaseEntry, StoreError> {
        require("question", question)?;
        require("answer", answer)?;

        let entry = KnowledgeBaseEntry::new(escape_markup(question), escape_markup(answer), source);
        let key = keys::knowledge(&entry.id.to_string());
        let raw = encode(&key, &entry)?;

        // Index first: a crash in between leaves a dangling member, not a lost record.
        self.backend.set_add(keys::KNOWLEDGE_INDEX, &key).await?;
        self.backend.set(&key, &raw).await?;

        info!(entry_id = %entry.id, source = %entry.source, "Added knowledge base entry");
        Ok(entry)
    }

    /// Returns the stored answer for an exactly matching question and records
    /// the hit. `Ok(None)` on a miss.
    pub async fn find_answer(&self, question: &str) -> Result<Option<String>, StoreError> {
        let wanted = question_key(question);
        if wanted.is_empty() {
            return Ok(None);
        }

        for key in self.backend.set_members(keys::KNOWLEDGE_INDEX).await? {
            let Some(raw) = self.backend.get(&key).await? else {
                debug!("Index member {key} has no record");
                continue;
            };
            let entry: KnowledgeBaseEntry = match decode(&key, &raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable knowledge entry: {e}");
                    continue;
                }
            };
            if normalize_question(&entry.question) != wanted {
                continue;
            }
            // atomic on the store side; concurrent hits never conflict
            let Some(raw) = self.backend.record_hit(&key, timestamp::now()).await? else {
                debug!("Knowledge entry {key} deleted before its hit was recorded");
                continue;
            };
            let hit: KnowledgeBaseEntry = decode(&key, &raw)?;
            debug!(entry_id = %hit.id, usage_count = hit.usage_count, "Knowledge hit");
            return Ok(Some(hit.answer));
        }

        Ok(None)
    }

    pub async fn get_entry(&self, id: &str) -> Result<KnowledgeBaseEntry, StoreError> {
        let not_found = || StoreError::NotFound {
            kind: "knowledge entry",
            id: id.to_string(),
        };
        let key = keys::record_key(keys::KNOWLEDGE_PREFIX, id).ok_or_else(not_found)?;
        let raw = self.backend.get(&key).await?.ok_or_else(not_found)?;
        decode(&key, &raw)
    }

    /// All entries, most recently used first. Unreadable records are skipped.
    pub async fn get_all_entries(&self) -> Result<Vec<KnowledgeBaseEntry>, StoreError> {
        let mut entries = Vec::new();
        for key in self.backend.set_members(keys::KNOWLEDGE_INDEX).await? {
            let Some(raw) = self.backend.get(&key).await? else {
                debug!("Index member {key} has no record");
                continue;
            };
            match decode::<KnowledgeBaseEntry>(&key, &raw) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable knowledge entry: {e}"),
            }
        }
        entries.sort_by(|a, b| b.last_used.cmp(&a.last_used).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Returns whether an entry existed. Deleting twice is not an error.
    pub async fn delete_entry(&self, id: &str) -> Result<bool, StoreError> {
        let Some(key) = keys::record_key(keys::KNOWLEDGE_PREFIX, id) else {
            return Ok(false);
        };
        let existed = self.backend.delete(&key).await?;
        self.backend.set_remove(keys::KNOWLEDGE_INDEX, &key).await?;
        if existed {
            info!(entry_id = id, "Deleted knowledge base entry");
        }
        Ok(existed)
    }

    /// Adds `seed` entries for facts whose question is not already known.
    pub async fn seed_entries(
        &self,
        facts: &[SeedFact],
    ) -> Result<Vec<KnowledgeBaseEntry>, StoreError> {
        let mut known: HashSet<String> = self
            .get_all_entries()
            .await?
            .iter()
            .map(|e| normalize_question(&e.question))
            .collect();

        let mut created = Vec::new();
        for fact in facts {
            if !known.insert(question_key(&fact.question)) {
                continue;
            }
            created.push(
                self.add_entry(&fact.question, &fact.answer, KnowledgeSource::Seed)
                    .await?,
            );
        }
        info!(
            seeded = created.len(),
            skipped = facts.len() - created.len(),
            "Seeded knowledge base"
        );
        Ok(created)
    }

    pub async fn reconcile_index(&self) -> Result<IndexRepair, StoreError> {
        reconcile_index(
            self.backend.as_ref(),
            keys::KNOWLEDGE_PREFIX,
            keys::KNOWLEDGE_INDEX,
        )
        .await
    }
}
