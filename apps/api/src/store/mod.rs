//! Backing key/value store abstraction shared by the knowledge and request stores.
//!
//! The contract is deliberately small: string values at string keys, unordered
//! string sets used as enumeration indexes, one atomic conditional update
//! (`compare_and_swap`) and the atomic usage bump behind knowledge hits
//! (`record_hit`). Everything else is built on top of these.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub mod memory;
pub mod redis_backend;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

/// Upper bound on request transition retries before giving up with `Contention`.
pub const MAX_CAS_ATTEMPTS: u32 = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot move request {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Gave up updating {key} after {attempts} conflicting writes")]
    Contention { key: String, attempts: u32 },
}

impl StoreError {
    pub fn corrupt(key: &str, err: impl std::fmt::Display) -> Self {
        StoreError::CorruptRecord {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of an index reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexRepair {
    /// Records that existed but were missing from the index.
    pub restored: usize,
    /// Index members whose record no longer exists.
    pub pruned: usize,
}

/// The backing store. Carried by both entity stores as `Arc<dyn KvBackend>`.
///
/// Implementations must make `compare_and_swap` atomic per key; the entity
/// stores hold no in-process locks and rely on it for every read-modify-write.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Writes `new` only if the current value is exactly `expected`.
    /// Returns `false` (and writes nothing) if the key is missing or changed.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError>;

    /// Records one lookup hit on the JSON record at `key` in a single atomic
    /// step: `usage_count` goes up by one and `last_used` becomes
    /// `max(now, last_used + 1µs)`. Returns the updated record, or `None` if
    /// the key is missing.
    async fn record_hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError>;

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError>;

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError>;

    /// All keys beginning with `prefix`. Only used for index reconciliation.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Rejects blank required input before anything touches the store.
pub fn require(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Brings `index` back in line with the records stored under `prefix`:
/// re-adds records the index lost and drops members pointing at nothing.
///
/// Must run before writers start: a create in flight (index member written,
/// record not yet) would otherwise be pruned.
pub async fn reconcile_index(
    backend: &dyn KvBackend,
    prefix: &str,
    index: &str,
) -> Result<IndexRepair, StoreError> {
    let members: HashSet<String> = backend.set_members(index).await?.into_iter().collect();
    let mut repair = IndexRepair::default();

    for key in backend.scan_prefix(prefix).await? {
        if keys::record_id(&key, prefix).is_some() && !members.contains(&key) {
            backend.set_add(index, &key).await?;
            repair.restored += 1;
        }
    }
    for member in &members {
        if backend.get(member).await?.is_none() {
            backend.set_remove(index, member).await?;
            repair.pruned += 1;
        }
    }

    if repair != IndexRepair::default() {
        warn!(
            index,
            restored = repair.restored,
            pruned = repair.pruned,
            "Repaired drifted index"
        );
    }
    Ok(repair)
}

/// Key layout. Record keys double as index members.
pub mod keys {
    use uuid::Uuid;

    pub const KNOWLEDGE_PREFIX: &str = "knowledge:";
    pub const KNOWLEDGE_INDEX: &str = "knowledge:index";
    pub const REQUEST_PREFIX: &str = "help_request:";
    /// Every request key. Status is read from the record itself.
    pub const REQUEST_INDEX: &str = "help_request:index";

    pub fn knowledge(id: &str) -> String {
        format!("{KNOWLEDGE_PREFIX}{id}")
    }

    pub fn help_request(id: &str) -> String {
        format!("{REQUEST_PREFIX}{id}")
    }

    /// Record key for an id supplied by a caller. `None` unless `id` is a
    /// UUID, so no caller-supplied id can address an index set.
    pub fn record_key(prefix: &str, id: &str) -> Option<String> {
        Uuid::parse_str(id).ok().map(|id| format!("{prefix}{id}"))
    }

    /// Extracts the id from a record key, rejecting index keys and foreign keys.
    pub fn record_id<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
        key.strip_prefix(prefix)
            .filter(|id| Uuid::parse_str(id).is_ok())
    }
}
