use std::sync::Arc;

use crate::config::Config;
use crate::escalation::Escalation;
use crate::store::KvBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<Escalation>,
    /// Kept for health checks; the stores hold their own handles.
    pub backend: Arc<dyn KvBackend>,
    pub config: Config,
}
