pub mod config;
pub mod directory;
pub mod handlers;
pub mod server;

pub use config::ApiConfig;
pub use directory::{PoolDirectory, PoolView};
pub use server::{router, ApiServer, ApiState};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mirror_core::MirrorError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server error: {0}")]
    Server(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MirrorError> for ApiError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::PoolNotFound(_) => ApiError::NotFound("Pool not found".to_string()),
            MirrorError::OrderNotFound(..) => ApiError::NotFound("Order not found".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Server(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
