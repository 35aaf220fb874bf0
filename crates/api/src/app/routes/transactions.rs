use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use corebank_core::MovementId;
use corebank_ledger::MovementKind;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// The movement ledger is append-only: the collection is read-only apart
/// from creation, which applies a movement of any kind through the movement
/// engine.
pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transaction).get(list_transactions))
        .route("/:id", get(get_transaction))
}

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateMovementRequest>,
) -> axum::response::Response {
    let kind: MovementKind = match body.transaction_type.parse() {
        Ok(kind) => kind,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services
        .apply_movement(body.account_id, kind, body.amount, body.description)
        .await
    {
        Ok(movement) => (StatusCode::CREATED, Json(movement)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.ledger().movements().await {
        Ok(movements) => (StatusCode::OK, Json(movements)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MovementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid movement id")
        }
    };
    match services.ledger().movement(id).await {
        Ok(movement) => (StatusCode::OK, Json(movement)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
