//! td-daemon entry point.
//!
//! Thin by design, mirroring the teacher's `mqk-daemon::main`: load config,
//! build shared state, wire middleware, serve. All route handlers live in
//! `routes.rs`; all shared state lives in `state.rs`.

use std::sync::Arc;

use anyhow::Context;
use td_daemon::{routes, state::AppState};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = td_config::DaemonConfig::load().context("loading configuration")?;

    let pool = td_db::connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;

    // Testing mode (spec.md §4.5): schema creation and worker spawning are
    // both suppressed so tests can drive the queue protocol directly.
    if !config.testing {
        td_db::migrate(&pool).await.context("running migrations")?;
    }

    let http = td_dispatch::build_http_client(config.downstream_timeout)
        .context("building downstream HTTP client")?;
    let downstream = Arc::new(config.downstream.clone());

    let worker_pool = if !config.testing {
        info!(count = config.worker_count, "spawning workers");
        Some(td_worker::WorkerPool::spawn(
            config.worker_count,
            pool.clone(),
            http.clone(),
            Arc::clone(&downstream),
        ))
    } else {
        info!("TESTING=1: worker pool not spawned");
        None
    };

    let state = Arc::new(AppState::new(pool.clone()));

    let app = routes::build_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("td-daemon listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    if let Some(pool_handle) = worker_pool {
        info!("shutting down workers");
        pool_handle.shutdown().await;
    }
    pool.close().await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Resolves on SIGINT (`Ctrl+C`) or, on Unix, SIGTERM — the standard signal
/// pair a process supervisor sends for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
