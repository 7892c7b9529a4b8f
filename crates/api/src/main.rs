use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use huddle_collab::CollabServices;
use huddle_db::{AuditStore, PgAuditStore, PgLockStore};
use huddle_events::{AuditLogger, AuditWriter};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use huddle_api::background;
use huddle_api::config::ServerConfig;
use huddle_api::router::build_app_router;
use huddle_api::state::AppState;
use huddle_api::ws::{self, LockEventRelay, WsManager};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        lock_ttl_mins = config.collab.lock_ttl.mins(),
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = huddle_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    huddle_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    huddle_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let cancel = CancellationToken::new();

    // --- Audit queue ---
    let audit_store: Arc<dyn AuditStore> = Arc::new(PgAuditStore::new(pool.clone()));
    let (audit_logger, audit_rx) = AuditLogger::channel(config.collab.audit_buffer_size);
    let audit_handle = tokio::spawn(AuditWriter::run(
        Arc::clone(&audit_store),
        audit_rx,
        cancel.clone(),
    ));

    // --- Collaboration services ---
    let services = Arc::new(CollabServices::new(
        Arc::new(PgLockStore::new(pool.clone())),
        Arc::new(audit_logger),
        config.collab.lock_ttl,
    ));

    // --- WebSocket manager, relay and ping ---
    let ws_manager = Arc::new(WsManager::new());
    let relay_handle = tokio::spawn(
        LockEventRelay::new(Arc::clone(&ws_manager)).run(services.bus.subscribe(), cancel.clone()),
    );
    let ping_handle = ws::start_heartbeat(Arc::clone(&ws_manager), cancel.clone());

    // --- Background sweeps ---
    let cleanup_interval = Duration::from_secs(config.collab.lock_cleanup_interval_secs);
    let mut jobs = vec![
        tokio::spawn(background::lock_cleanup::run(
            Arc::clone(&services),
            cleanup_interval,
            cancel.clone(),
        )),
        tokio::spawn(background::channel_pruning::run(
            Arc::clone(&services),
            cleanup_interval,
            cancel.clone(),
        )),
    ];
    if config.collab.presence_sweep_enabled() {
        jobs.push(tokio::spawn(background::presence_staleness::run(
            Arc::clone(&services),
            Duration::from_secs(config.collab.heartbeat_interval_secs),
            config.collab.presence_stale_timeout_secs,
            cancel.clone(),
        )));
    } else {
        tracing::info!("Presence staleness sweep disabled");
    }

    // --- App state ---
    let state = AppState {
        pool: Some(pool),
        config: Arc::new(config.clone()),
        services: Arc::clone(&services),
        audit_store,
        ws_manager: Arc::clone(&ws_manager),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    for job in jobs {
        let _ = tokio::time::timeout(grace, job).await;
    }
    let _ = tokio::time::timeout(grace, relay_handle).await;
    let _ = tokio::time::timeout(grace, ping_handle).await;
    tracing::info!("Background jobs stopped");

    // The writer drains whatever is still queued before it exits.
    let _ = tokio::time::timeout(grace, audit_handle).await;
    tracing::info!("Audit writer stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
