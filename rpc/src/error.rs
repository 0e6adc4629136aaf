//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use plaudit_node::ServiceError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request could not be parsed into the operation's schema.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found")]
    NotFound,

    #[error("config error: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Service(e) => match e {
                ServiceError::InvalidInput(_)
                | ServiceError::MissingFields(_)
                | ServiceError::InvalidProposalId(_) => StatusCode::BAD_REQUEST,
                ServiceError::Unauthenticated | ServiceError::VerificationFailed(_) => {
                    StatusCode::UNAUTHORIZED
                }
                ServiceError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
                ServiceError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Service(e) => e.kind(),
            Self::InvalidInput(_) => "InvalidInput",
            Self::NotFound => "NotFound",
            Self::Config(_) | Self::Server(_) => "InternalError",
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error, kind })).into_response()
    }
}
