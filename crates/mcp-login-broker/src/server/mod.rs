//! HTTP server for the authorization broker.
//!
//! Routes:
//! - `GET /authorize`: consent page or direct redirect to the IdP
//! - `POST /authorize`: consent form submission
//! - `GET /callback`: IdP redirect target
//! - `GET /health`: liveness check

pub mod handlers;
pub mod pages;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::flow::AuthorizationFlow;

/// Broker HTTP server.
#[derive(Debug)]
pub struct BrokerServer {
    flow: Arc<AuthorizationFlow>,
}

impl BrokerServer {
    #[must_use]
    pub fn new(flow: AuthorizationFlow) -> Self {
        Self {
            flow: Arc::new(flow),
        }
    }

    /// Run the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(
            base_url = %self.flow.config().base_url,
            callback_url = %self.flow.config().callback_url(),
            "Starting authorization broker"
        );

        let router = transport::create_router(self.flow);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    /// Get the flow controller.
    #[must_use]
    pub fn flow(&self) -> &Arc<AuthorizationFlow> {
        &self.flow
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
