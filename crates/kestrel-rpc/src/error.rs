use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kestrel_server::ServerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Server(#[from] ServerError),
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = match &self {
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RpcError::Server(ServerError::UnknownBlock | ServerError::UnknownParent(_)) => {
                StatusCode::NOT_FOUND
            }
            RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match self {
            RpcError::NotFound(msg) | RpcError::BadRequest(msg) | RpcError::Internal(msg) => msg,
            RpcError::Server(e) => e.to_string(),
        };

        let body = json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}
