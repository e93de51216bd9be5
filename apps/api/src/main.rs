use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use frontdesk_api::config::{Config, StoreBackendKind};
use frontdesk_api::escalation::Escalation;
use frontdesk_api::knowledge::{KnowledgeStore, SeedFact};
use frontdesk_api::notify::LogNotifier;
use frontdesk_api::requests::RequestStore;
use frontdesk_api::routes::build_router;
use frontdesk_api::state::AppState;
use frontdesk_api::store::{KvBackend, MemoryBackend, RedisBackend};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = &config.rust_log;
            EnvFilter::new(format!(
                "{}={level},frontdesk_api={level},tower_http={level}",
                env!("CARGO_CRATE_NAME")
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Frontdesk API v{}", env!("CARGO_PKG_VERSION"));

    // One backend handle, shared by both stores
    let backend: Arc<dyn KvBackend> = match config.store_backend {
        StoreBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis backend")?;
            Arc::new(RedisBackend::connect(url, config.store_timeout).await?)
        }
        StoreBackendKind::Memory => {
            warn!("Using in-memory store; nothing survives a restart");
            Arc::new(MemoryBackend::new())
        }
    };
    backend.ping().await?;

    let knowledge = KnowledgeStore::new(backend.clone());
    let requests = RequestStore::new(backend.clone());

    let repaired = knowledge.reconcile_index().await?;
    info!(?repaired, "Knowledge index checked");
    let repaired = requests.reconcile_index().await?;
    info!(?repaired, "Help request index checked");

    if let Some(path) = &config.knowledge_seed_path {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read knowledge seed file {path}"))?;
        let facts: Vec<SeedFact> = serde_json::from_str(&raw)
            .with_context(|| format!("Knowledge seed file {path} is not a list of facts"))?;
        knowledge.seed_entries(&facts).await?;
    }

    let notifier = Arc::new(LogNotifier::new(
        config.supervisor_phone.clone(),
        config.dashboard_url.clone(),
    ));
    let state = AppState {
        desk: Arc::new(Escalation::new(knowledge, requests, notifier)),
        backend,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
