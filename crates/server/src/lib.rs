pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod service;

pub use config::ServerConfig;
pub use routes::router;
pub use service::DetectionService;

use detector::DetectionBackend;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const SERVICE_NAME: &str = "detector-server";

/// Serve until `shutdown` resolves, then stop accepting connections and give
/// in-flight requests `grace` to finish before aborting the server task.
pub async fn serve_with_shutdown<B, S>(
    listener: TcpListener,
    service: DetectionService<B>,
    shutdown: S,
    grace: Duration,
) -> anyhow::Result<()>
where
    B: DetectionBackend + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let app = router(service);
    let stop = Arc::new(Notify::new());
    let stopped = Arc::clone(&stop);

    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stopped.notified().await })
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => {
            joined??;
            return Ok(());
        }
        () = shutdown => {
            tracing::info!(grace_secs = grace.as_secs_f64(), "Shutdown signal received, draining requests");
        }
    }

    stop.notify_one();
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!("Grace period elapsed with requests in flight, aborting");
            server.abort();
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
