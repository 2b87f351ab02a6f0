use crate::config::ApiConfig;
use crate::directory::PoolDirectory;
use crate::handlers;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<dyn PoolDirectory>,
    pub config: Arc<ApiConfig>,
}

impl ApiState {
    pub fn new(directory: Arc<dyn PoolDirectory>, config: ApiConfig) -> Self {
        Self {
            directory,
            config: Arc::new(config),
        }
    }
}

/// Routes of the query surface, without middleware
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/pools", get(handlers::list_pools))
        .route("/pools/{address}", get(handlers::pool_info))
        .route("/pools/{address}/orderbook", get(handlers::order_book))
        .route("/pools/{address}/get-amount-out", get(handlers::amount_out))
        .route("/pools/{address}/orders/{id}", get(handlers::order))
        .route("/pools/{address}/{trader}/orders", get(handlers::user_orders))
        .route(
            "/pools/{address}/{trader}/market-orders",
            get(handlers::user_market_orders),
        )
        .with_state(state)
}

/// REST API server
pub struct ApiServer {
    config: ApiConfig,
    directory: Arc<dyn PoolDirectory>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, directory: Arc<dyn PoolDirectory>) -> Self {
        Self { config, directory }
    }

    /// Serve until shutdown
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> crate::Result<()> {
        let addr = self.config.address();

        let cors = if self.config.cors_enabled {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        };

        let app = router(ApiState::new(self.directory, self.config))
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        info!(address = %addr, "Starting REST API server");

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::ApiError::Server(e.to_string()))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| crate::ApiError::Server(e.to_string()))?;

        Ok(())
    }
}
