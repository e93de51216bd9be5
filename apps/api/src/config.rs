use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendKind {
    Redis,
    Memory,
}

impl StoreBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackendKind::Redis => "redis",
            StoreBackendKind::Memory => "memory",
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackendKind,
    pub redis_url: Option<String>,
    pub store_timeout: Duration,
    pub supervisor_phone: String,
    pub dashboard_url: String,
    pub knowledge_seed_path: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend = match optional_env("STORE_BACKEND").as_deref() {
            None | Some("redis") => StoreBackendKind::Redis,
            Some("memory") => StoreBackendKind::Memory,
            Some(other) => bail!("STORE_BACKEND must be 'redis' or 'memory', got '{other}'"),
        };
        let redis_url = match store_backend {
            StoreBackendKind::Redis => Some(require_env("REDIS_URL")?),
            StoreBackendKind::Memory => optional_env("REDIS_URL"),
        };

        Ok(Config {
            store_backend,
            redis_url,
            store_timeout: Duration::from_millis(
                std::env::var("STORE_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse::<u64>()
                    .context("STORE_TIMEOUT_MS must be a whole number of milliseconds")?,
            ),
            supervisor_phone: std::env::var("SUPERVISOR_PHONE")
                .unwrap_or_else(|_| "+1234567890".to_string()),
            dashboard_url: std::env::var("DASHBOARD_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            knowledge_seed_path: optional_env("KNOWLEDGE_SEED_PATH"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
