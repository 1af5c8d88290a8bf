//! Todo Backend - REST API server
//!
//! Wires the configured coordination store into the request pipeline and
//! serves the todo API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todo_backend::pipeline::install_panic_hook;
use todo_backend::store::{CoordinationStore, MemoryStore};
use todo_backend::{create_router, spawn_cleanup_task, AppState, Config};

/// Main entry point for the todo backend.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Connect the coordination store (Redis or in-memory)
/// 4. Start the task queue workers and store cleanup
/// 5. Serve HTTP until SIGINT/SIGTERM
/// 6. Drain the task queue, then close the store
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    install_panic_hook();

    info!("Starting todo backend");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: port={}, rate_limit={}/{}s, cache_ttl={}s, workers={}",
        config.server_port,
        config.rate_limit_requests,
        config.rate_limit_window_secs,
        config.cache_ttl_secs,
        config.task_queue_workers
    );

    let root = CancellationToken::new();
    let (store, cleanup_handle) = connect_store(&config, &root).await?;

    let state = AppState::new(config.clone(), store.clone());
    state.tasks.start(&root).await;

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    // Queue drains before the store goes away; tasks still need it.
    state.tasks.shutdown().await;
    root.cancel();
    if let Some(handle) = cleanup_handle {
        if let Err(err) = handle.await {
            error!(error = %err, "store cleanup task terminated abnormally");
        }
    }
    if let Err(err) = store.close().await {
        warn!(error = %err, "store close failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Picks the store backend from `REDIS_URL`.
///
/// The in-memory store also gets its background cleanup task.
async fn connect_store(
    config: &Config,
    root: &CancellationToken,
) -> anyhow::Result<(Arc<dyn CoordinationStore>, Option<tokio::task::JoinHandle<()>>)> {
    if let Some(url) = &config.redis_url {
        #[cfg(feature = "redis")]
        {
            let store = todo_backend::store::RedisStore::connect(url)
                .await
                .context("failed to connect to redis")?;
            info!("Coordination store: redis");
            return Ok((Arc::new(store), None));
        }

        #[cfg(not(feature = "redis"))]
        warn!(
            url = %url,
            "REDIS_URL set but built without the redis feature, using in-memory store"
        );
    }

    let store = MemoryStore::new();
    let handle = spawn_cleanup_task(store.clone(), config.cleanup_interval, root.child_token());
    info!("Coordination store: in-memory");
    Ok((Arc::new(store), Some(handle)))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
