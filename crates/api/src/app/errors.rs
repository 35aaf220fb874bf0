use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use corebank_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InvalidAmount => {
            json_error(StatusCode::BAD_REQUEST, "invalid_amount", err.to_string())
        }
        DomainError::InvalidKind(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_kind", err.to_string())
        }
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::InsufficientFunds => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_funds",
            err.to_string(),
        ),
        DomainError::AlreadyLinked => {
            json_error(StatusCode::CONFLICT, "already_linked", err.to_string())
        }
        DomainError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
