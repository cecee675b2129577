//! HTTP server lifecycle.
//!
//! bind → serve the router → stop on a shutdown signal. The entry point
//! passes ctrl-c; tests pass a oneshot receiver.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// Bind the listen address.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!(addr = %local, "HTTP server bound");
    }
    Ok(listener)
}

/// Serve `app` until `shutdown` resolves. In-flight requests are drained.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("HTTP server received shutdown signal");
        })
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Resolves on ctrl-c. A failing signal handler never resolves.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
}
