//! Request Store: the escalation lifecycle.
//!
//! pending -> resolved -> unresolved -> resolved ...
//!
//! Transitions are CAS loops over the raw record. All requests share one index
//! set and enumerations filter on the status stored in each record, so a
//! transition never has to move index membership around.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{decode, encode, timestamp, HelpRequest, RequestStatus};
use crate::store::{
    keys, reconcile_index, require, IndexRepair, KvBackend, StoreError, MAX_CAS_ATTEMPTS,
};

#[derive(Clone)]
pub struct RequestStore {
    backend: Arc<dyn KvBackend>,
}

impl RequestStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub async fn create_help_request(
        &self,
        customer_phone: &str,
        question: &str,
        context: Option<&str>,
    ) -> Result<HelpRequest, StoreError> {
        require("customer_phone", customer_phone)?;
        require("question", question)?;

        let context = context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let request = HelpRequest::new(customer_phone.to_string(), question.to_string(), context);
        let key = keys::help_request(&request.id.to_string());
        let raw = encode(&key, &request)?;

        self.backend.set_add(keys::REQUEST_INDEX, &key).await?;
        self.backend.set(&key, &raw).await?;

        info!(request_id = %request.id, "Created help request");
        Ok(request)
    }

    pub async fn get_help_request(&self, id: &str) -> Result<HelpRequest, StoreError> {
        let (_, request) = self.load(id, &request_key(id)?).await?;
        Ok(request)
    }

    /// Valid from `pending` and `unresolved`. Re-resolving a resolved request
    /// replaces the answer.
    pub async fn resolve_request(&self, id: &str, answer: &str) -> Result<HelpRequest, StoreError> {
        require("answer", answer)?;
        let (resolved, _) = self
            .transition(id, |current| {
                Ok(Some(current.resolved(answer, timestamp::now())))
            })
            .await?;
        info!(request_id = id, "Resolved help request");
        Ok(resolved)
    }

    /// Retracts a resolution and clears the previous answer. A request that
    /// was never resolved cannot be retracted; retracting twice is a no-op.
    pub async fn mark_request_unresolved(&self, id: &str) -> Result<HelpRequest, StoreError> {
        let (request, written) = self
            .transition(id, |current| match current.status {
                RequestStatus::Resolved => Ok(Some(current.retracted())),
                RequestStatus::Unresolved => Ok(None),
                RequestStatus::Pending => Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: RequestStatus::Pending.as_str(),
                    to: RequestStatus::Unresolved.as_str(),
                }),
            })
            .await?;
        if written {
            info!(request_id = id, "Marked help request unresolved");
        } else {
            debug!(request_id = id, "Help request already unresolved");
        }
        Ok(request)
    }

    /// Oldest first.
    pub async fn get_pending_requests(&self) -> Result<Vec<HelpRequest>, StoreError> {
        let mut requests = self.with_status(RequestStatus::Pending).await?;
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    /// Most recently resolved first.
    pub async fn get_resolved_requests(&self) -> Result<Vec<HelpRequest>, StoreError> {
        let mut requests = self.with_status(RequestStatus::Resolved).await?;
        requests.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    /// Retracted requests, newest first.
    pub async fn get_unresolved_requests(&self) -> Result<Vec<HelpRequest>, StoreError> {
        let mut requests = self.with_status(RequestStatus::Unresolved).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    pub async fn reconcile_index(&self) -> Result<IndexRepair, StoreError> {
        reconcile_index(
            self.backend.as_ref(),
            keys::REQUEST_PREFIX,
            keys::REQUEST_INDEX,
        )
        .await
    }

    /// Raw and decoded record at `key`.
    async fn load(&self, id: &str, key: &str) -> Result<(String, HelpRequest), StoreError> {
        let raw = self
            .backend
            .get(key)
            .await?
            .ok_or_else(|| not_found(id))?;
        let request = decode(key, &raw)?;
        Ok((raw, request))
    }

    /// Read, apply, compare-and-swap, retry. `apply` returning `Ok(None)`
    /// means "already in the wanted state" and writes nothing. The flag says
    /// whether a write happened.
    async fn transition<F>(&self, id: &str, apply: F) -> Result<(HelpRequest, bool), StoreError>
    where
        F: Fn(&HelpRequest) -> Result<Option<HelpRequest>, StoreError>,
    {
        let key = request_key(id)?;
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (raw, current) = self.load(id, &key).await?;
            let Some(next) = apply(&current)? else {
                return Ok((current, false));
            };
            let new_raw = encode(&key, &next)?;
            if self.backend.compare_and_swap(&key, &raw, &new_raw).await? {
                return Ok((next, true));
            }
            debug!(attempt, "Concurrent write to {key}, retrying");
        }
        Err(StoreError::Contention {
            key,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    async fn with_status(&self, status: RequestStatus) -> Result<Vec<HelpRequest>, StoreError> {
        let mut requests = Vec::new();
        for key in self.backend.set_members(keys::REQUEST_INDEX).await? {
            let Some(raw) = self.backend.get(&key).await? else {
                debug!("Index member {key} has no record");
                continue;
            };
            match decode::<HelpRequest>(&key, &raw) {
                Ok(request) if request.status == status => requests.push(request),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable help request: {e}"),
            }
        }
        Ok(requests)
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::NotFound {
        kind: "help request",
        id: id.to_string(),
    }
}

/// Ids that are not UUIDs are `NotFound` without touching the store.
fn request_key(id: &str) -> Result<String, StoreError> {
    keys::record_key(keys::REQUEST_PREFIX, id).ok_or_else(|| not_found(id))
}
