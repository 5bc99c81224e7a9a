use anyhow::Result;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

mod config;
mod error;
mod routes;
mod server;
mod state;

use config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::var("ENGINE_LOG_DIR").unwrap_or_else(|_| {
        dirs::data_local_dir()
            .map(|d| d.join("content-engine").join("logs").to_string_lossy().to_string())
            .unwrap_or_else(|| ".content-engine/logs".to_string())
    });
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "engine-server.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "engine_server=info,engine_core=info,tower_http=info".into());

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(true).compact();
    let file_layer = tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(true).with_ansi(false).with_writer(non_blocking_writer).compact();

    tracing_subscriber::registry().with(env_filter).with(stdout_layer).with(file_layer).init();

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())).unwrap_or_default();
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        error!(target: "engine_server::panic", location = %location, payload = %payload, "PANIC: thread panicked");
        default_panic(info);
    }));

    routes::health::init_start_time();
    routes::health::init_shutdown_notify();

    let server_config = ServerConfig::from_env();
    let addr: SocketAddr = server_config.listen_addr.parse()?;

    info!(
        listen_addr = %server_config.listen_addr,
        data_dir = %server_config.engine.data_dir.display(),
        api_key_configured = server_config.api_key.is_some(),
        log_dir = %log_dir,
        "content engine starting"
    );

    let app_state = state::AppState::new(server_config).await?;
    let app = server::create_app(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("content engine listening on {}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("content engine shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = async {
        tokio::signal::ctrl_c().await.expect("failed to install secondary Ctrl+C handler");
    };

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, initiating shutdown"); },
        _ = terminate => { info!("received terminate signal, initiating shutdown"); },
        _ = crate::routes::health::wait_for_shutdown() => { info!("received shutdown request via HTTP endpoint, initiating shutdown"); },
    }
}
