use crate::config::MetricsConfig;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::broadcast;
use tracing::info;

/// Metrics HTTP Server
pub struct MetricsServer {
    config: MetricsConfig,
    handle: PrometheusHandle,
}

impl MetricsServer {
    /// `handle` comes from [`crate::init`]
    pub fn new(config: MetricsConfig, handle: PrometheusHandle) -> Self {
        Self { config, handle }
    }

    /// Serve `/metrics` until shutdown
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> crate::Result<()> {
        let addr = self.config.address();
        let handle = self.handle;

        let app = Router::new()
            .route("/metrics", get(move || metrics_handler(handle.clone())))
            .route("/health", get(health_handler));

        info!(address = %addr, "Starting metrics server");

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::MetricsError::Server(e.to_string()))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| crate::MetricsError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Metrics endpoint handler
async fn metrics_handler(handle: PrometheusHandle) -> String {
    handle.render()
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
