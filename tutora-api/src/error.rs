use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use tutora_entitlement::{AttachError, ReconcileError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    UnprocessableError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}

/// Map reconciliation results onto HTTP semantics: a missing customer is the
/// caller's problem (404), everything else is ours (500).
pub fn reconcile_error(err: ReconcileError) -> AppError {
    match err {
        ReconcileError::CustomerNotFound(id) => {
            AppError::NotFoundError(format!("customer not found: {}", id))
        }
        ReconcileError::Store(e) => AppError::InternalServerError(e.to_string()),
    }
}

/// Booking attachment mapping: unknown invitee 404, nothing purchased 422,
/// plan used up 409. Replays never reach here, they are a 200 upstream.
pub fn attach_error(err: AttachError) -> AppError {
    match err {
        AttachError::CustomerNotFound(email) => {
            AppError::NotFoundError(format!("no customer for invitee {}", email))
        }
        AttachError::NoEntitlement(id) => {
            AppError::UnprocessableError(format!("customer {} has no purchased plans", id))
        }
        AttachError::EntitlementExhausted { block_name, .. } => {
            AppError::ConflictError(format!("no sessions remaining on {}", block_name))
        }
        AttachError::Store(e) => AppError::InternalServerError(e.to_string()),
    }
}
