use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tokio::sync::Notify;

use crate::state::AppState;

static START_TIME: OnceLock<Instant> = OnceLock::new();
static SHUTDOWN_NOTIFY: OnceLock<Arc<Notify>> = OnceLock::new();

pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Initializes the shutdown notifier; must be called once at startup before
/// `shutdown` or `wait_for_shutdown` are reachable.
pub fn init_shutdown_notify() -> Arc<Notify> {
    SHUTDOWN_NOTIFY.get_or_init(|| Arc::new(Notify::new())).clone()
}

/// Resolves when `POST /api/v1/shutdown` fires a notification, so `main`
/// can race it alongside the OS signal futures.
pub async fn wait_for_shutdown() {
    if let Some(notify) = SHUTDOWN_NOTIFY.get() {
        notify.notified().await;
    } else {
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub store: bool,
    pub reranker_configured: bool,
    pub llm_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub services: ServiceStatus,
}

/// Store reachability gates healthy/unhealthy; an unconfigured reranker or
/// LLM tier only degrades, since both gateways are designed to fall back
/// gracefully.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_secs = START_TIME.get().map(|s| s.elapsed().as_secs()).unwrap_or(0);
    let store_ok = state.store.stats().await.is_ok();

    let llm_configured = !state.config.llm.llm_providers.is_empty();
    let reranker_configured = state.config.reranker.reranker_url.is_some();

    let status = if !store_ok {
        HealthStatus::Unhealthy
    } else if !llm_configured || !reranker_configured {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    Json(HealthResponse {
        status,
        service: "content-engine",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs,
        services: ServiceStatus {
            store: store_ok,
            reranker_configured,
            llm_configured,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub status: &'static str,
}

/// Authenticated graceful-shutdown trigger: wakes `wait_for_shutdown`, which
/// `main`'s `shutdown_signal` races alongside Ctrl+C/SIGTERM.
pub async fn shutdown() -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via HTTP endpoint");
    if let Some(notify) = SHUTDOWN_NOTIFY.get() {
        notify.notify_one();
    }
    Json(ShutdownResponse { status: "shutting_down" })
}
