//! Backend wrapper for driving contention and partial-failure paths in tests.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{KvBackend, MemoryBackend, StoreError};

#[derive(Default)]
pub(crate) struct FlakyBackend {
    inner: MemoryBackend,
    /// Yield to the scheduler before every call, like a network round trip.
    yielding: bool,
    /// Writes to keys or sets under this prefix fail as `Unavailable`.
    rejected_prefix: Option<&'static str>,
    /// Compare-and-swaps that will find their record rewritten underneath them.
    interleaved: AtomicU32,
    lost_swaps: AtomicU32,
    writes: AtomicU32,
}

impl FlakyBackend {
    pub fn yielding() -> Self {
        Self {
            yielding: true,
            ..Default::default()
        }
    }

    pub fn rejecting_writes_to(prefix: &'static str) -> Self {
        Self {
            rejected_prefix: Some(prefix),
            ..Default::default()
        }
    }

    /// The next `n` compare-and-swaps each lose to a concurrent rewrite.
    pub fn interleave_next_swaps(&self, n: u32) {
        self.interleaved.store(n, Ordering::SeqCst);
    }

    pub fn lost_swaps(&self) -> u32 {
        self.lost_swaps.load(Ordering::SeqCst)
    }

    /// Successful value writes, including swaps and hits.
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if self.yielding {
            tokio::task::yield_now().await;
        }
    }

    fn check_write(&self, key: &str) -> Result<(), StoreError> {
        match self.rejected_prefix {
            Some(prefix) if key.starts_with(prefix) => {
                Err(StoreError::Unavailable(format!("write to {key} rejected")))
            }
            _ => Ok(()),
        }
    }

    fn take_interleave(&self) -> bool {
        self.interleaved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KvBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.pause().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.pause().await;
        self.check_write(key)?;
        self.inner.set(key, value).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.pause().await;
        self.check_write(key)?;
        self.inner.delete(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        self.pause().await;
        self.check_write(key)?;
        if self.take_interleave() {
            // trailing whitespace: same record, different bytes
            if let Some(current) = self.inner.get(key).await? {
                self.inner.set(key, &format!("{current} ")).await?;
            }
        }
        let swapped = self.inner.compare_and_swap(key, expected, new).await?;
        if swapped {
            self.writes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.lost_swaps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(swapped)
    }

    async fn record_hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        self.pause().await;
        self.check_write(key)?;
        let updated = self.inner.record_hit(key, now).await?;
        if updated.is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(updated)
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.pause().await;
        self.check_write(set)?;
        self.inner.set_add(set, member).await
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.pause().await;
        self.check_write(set)?;
        self.inner.set_remove(set, member).await
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        self.pause().await;
        self.inner.set_members(set).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.pause().await;
        self.inner.scan_prefix(prefix).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
