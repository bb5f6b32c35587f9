//! HTTP server assembly
//!
//! Merges the webhook and status routers, adds per-request tracing spans, and
//! serves until Ctrl-C or SIGTERM. Detached processing tasks still running at
//! shutdown are not awaited.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebhookConfig;
use crate::error::Result;
use crate::handlers::status::status_router;
use crate::webhook::handler::{webhook_router, WebhookState};
use crate::webhook::processor::MessageHandler;

/// Build the full application router
pub fn app(state: Arc<WebhookState>) -> Router {
    let stats = state.stats();
    Router::new()
        .merge(webhook_router(state))
        .merge(status_router(stats))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until a shutdown signal
pub async fn serve(config: WebhookConfig, handler: Arc<dyn MessageHandler>) -> Result<()> {
    let state = Arc::new(WebhookState::new(&config, handler));
    let addr = config.socket_addr();

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Webhook receiver listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Webhook receiver stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
