//! Presence Hub Server
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use presence_auth::{HttpKeySource, KeyCache, TokenValidator};
use presence_core::config::AppConfig;
use presence_core::error::AppError;
use presence_realtime::ConnectionHub;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("PRESENCE_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting presence hub v{}", env!("CARGO_PKG_VERSION"));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 1: Signing keys + token validator ───────────────────
    let key_source = HttpKeySource::new(config.auth.jwks_url(), config.auth.jwks_fetch_timeout())
        .map_err(|e| AppError::internal(format!("Key source init failed: {}", e)))?;
    let key_cache = Arc::new(KeyCache::new(
        Arc::new(key_source),
        config.auth.key_refresh_interval(),
    ));
    let validator = Arc::new(TokenValidator::new(&config.auth, Arc::clone(&key_cache)));

    let refresher_handle = if config.auth.skip_token_verification {
        tracing::warn!("Token signature verification is DISABLED; do not run this in production");
        None
    } else {
        tracing::info!(url = %config.auth.jwks_url(), "Fetching signing keys...");
        match key_cache.refresh().await {
            Ok(count) => tracing::info!(keys = count, "Signing keys loaded"),
            Err(e) => tracing::warn!(
                error = %e,
                "Initial key fetch failed; keys will be fetched on first request"
            ),
        }

        let cache = Arc::clone(&key_cache);
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            run_key_refresher(cache, rx).await;
        }))
    };

    // ── Step 2: Connection hub ───────────────────────────────────
    let hub = Arc::new(ConnectionHub::new(config.realtime.clone()));
    tracing::info!(
        duplicate_policy = ?config.realtime.duplicate_policy,
        outbound_buffer = config.realtime.outbound_buffer_size,
        "Connection hub initialized"
    );

    // ── Step 3: Build and start HTTP server ──────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app_state = presence_api::AppState::new(
        Arc::new(config),
        Arc::clone(&validator),
        Arc::clone(&hub),
    );
    let app = presence_api::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Presence hub listening on {}", addr);

    // ── Step 4: Graceful shutdown ────────────────────────────────
    let shutdown_hub = Arc::clone(&hub);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
        let closed = shutdown_hub.close_all().await;
        tracing::info!(connections = closed, "Closed WebSocket connections");
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 5: Wait for background tasks ────────────────────────
    if let Some(handle) = refresher_handle {
        let _ = tokio::time::timeout(grace, handle).await;
    }

    tracing::info!("Presence hub shut down gracefully");
    Ok(())
}

/// Periodically refreshes the signing key set until shutdown.
async fn run_key_refresher(cache: Arc<KeyCache>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(cache.max_age());
    // The first tick fires immediately; keys were just fetched.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cache.refresh().await {
                    Ok(count) => tracing::debug!(keys = count, "Signing keys refreshed"),
                    Err(e) => tracing::warn!(error = %e, "Background key refresh failed"),
                }
            }
            _ = shutdown.changed() => {
                tracing::debug!("Key refresher stopping");
                break;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
