use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use corebank_core::BankId;
use corebank_registry::NewBank;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_bank).get(list_banks))
        .route("/:id", get(get_bank).put(update_bank).delete(delete_bank))
        .route("/:id/branches", get(list_bank_branches))
}

pub async fn create_bank(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewBank>,
) -> axum::response::Response {
    match services.registry().insert_bank(body).await {
        Ok(bank) => (StatusCode::CREATED, Json(bank)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_banks(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.registry().banks().await {
        Ok(banks) => (StatusCode::OK, Json(banks)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_bank(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BankId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bank id"),
    };
    match services.registry().bank(id).await {
        Ok(bank) => (StatusCode::OK, Json(bank)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_bank(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateBankRequest>,
) -> axum::response::Response {
    let id: BankId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bank id"),
    };
    match services
        .registry()
        .update_bank(id, body.name, body.code, body.location)
        .await
    {
        Ok(bank) => (StatusCode::OK, Json(bank)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_bank(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BankId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bank id"),
    };
    match services.registry().delete_bank(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_bank_branches(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BankId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid bank id"),
    };
    match services.registry().branches_of_bank(id).await {
        Ok(branches) => (StatusCode::OK, Json(branches)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
