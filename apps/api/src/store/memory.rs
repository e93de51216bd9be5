use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use super::{KvBackend, StoreError};
use crate::models::timestamp;

#[derive(Default)]
struct Inner {
    values: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-process backend with the same atomicity guarantees as Redis.
/// Used by tests and by `STORE_BACKEND=memory` local runs.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory backend is offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory backend lock poisoned".into()))
    }
}

/// Same update the Redis hit script performs, on the raw JSON record.
fn apply_hit(key: &str, raw: &str, now: DateTime<Utc>) -> Result<String, StoreError> {
    let mut record: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| StoreError::corrupt(key, e))?;
    let usage_count = record
        .get("usage_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let last_used = match record
        .get("last_used")
        .and_then(Value::as_str)
        .and_then(|prev| timestamp::parse(prev).ok())
    {
        Some(prev) => now.max(prev + Duration::microseconds(1)),
        None => now,
    };
    record.insert("usage_count".into(), Value::from(usage_count.saturating_add(1)));
    record.insert("last_used".into(), Value::from(timestamp::format(&last_used)));
    serde_json::to_string(&record).map_err(|e| StoreError::corrupt(key, e))
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Like `DEL`, removes a set stored under `key` too.
    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let value = inner.values.remove(key).is_some();
        let set = inner.sets.remove(key).is_some();
        Ok(value || set)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.values.get_mut(key) {
            Some(current) if current == expected => {
                *current = new.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock()?;
        let Some(current) = inner.values.get_mut(key) else {
            return Ok(None);
        };
        let updated = apply_hit(key, current, now)?;
        *current = updated.clone();
        Ok(Some(updated))
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.lock()?
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(members) = inner.sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                inner.sets.remove(set);
            }
        }
        Ok(())
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .values
            .keys()
            .chain(inner.sets.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
