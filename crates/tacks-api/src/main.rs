#![forbid(unsafe_code)]
//! Service entry point: configuration, store boot, and the signal-driven
//! server lifecycle.

use anyhow::{Context, Result};
use std::future::IntoFuture;
use tacks_api::{keepalive, router};
use tacks_core::config::Config;
use tacks_core::db::{self, repository::Repository};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tacks_api=info,tacks_core=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::from_env().context("load configuration")?;
    info!(
        read_timeout = ?cfg.server.read_timeout,
        write_timeout = ?cfg.server.write_timeout,
        shutdown_timeout = ?cfg.server.shutdown_timeout,
        "server timeouts configured"
    );

    let pool = db::open(&cfg.database).context("open store")?;
    {
        let conn = pool.get().context("checkout migration connection")?;
        db::migrations::run(&conn, &cfg.database.migration_dir).context("run migrations")?;
    }
    let repo = Repository::new(pool);

    let state = router::AppState::new(repo, cfg.auth.api_key.clone());
    let app = router::build_router(state, &cfg.server);

    if cfg.server.enable_keep_alive {
        match cfg.server.keep_alive_url {
            Some(ref url) => keepalive::spawn(url.clone()),
            None => warn!("keepalive enabled but APP_URL / RENDER_EXTERNAL_URL is not set"),
        }
    }

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "server listening");

    // The signal task flips the watch channel; the serve future drains
    // in-flight requests, and the deadline arms only once the signal fires.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.changed().await;
        })
        .into_future();

    let mut deadline_rx = shutdown_rx;
    let drain_deadline = cfg.server.shutdown_timeout;
    let deadline = async move {
        let _ = deadline_rx.changed().await;
        tokio::time::sleep(drain_deadline).await;
    };

    tokio::select! {
        result = server => result.context("server error")?,
        () = deadline => {
            warn!("shutdown deadline exceeded, closing remaining connections");
        }
    }

    info!("server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
