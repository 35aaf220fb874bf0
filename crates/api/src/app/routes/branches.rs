use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use corebank_core::BranchId;
use corebank_registry::NewBranch;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_branch).get(list_branches))
        .route("/:id", get(get_branch).put(update_branch).delete(delete_branch))
}

pub async fn create_branch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewBranch>,
) -> axum::response::Response {
    match services.registry().insert_branch(body).await {
        Ok(branch) => (StatusCode::CREATED, Json(branch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_branches(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.registry().branches().await {
        Ok(branches) => (StatusCode::OK, Json(branches)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_branch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BranchId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid branch id")
        }
    };
    match services.registry().branch(id).await {
        Ok(branch) => (StatusCode::OK, Json(branch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_branch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateBranchRequest>,
) -> axum::response::Response {
    let id: BranchId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid branch id")
        }
    };
    match services
        .registry()
        .update_branch(id, body.name, body.code, body.manager)
        .await
    {
        Ok(branch) => (StatusCode::OK, Json(branch)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_branch(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BranchId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid branch id")
        }
    };
    match services.registry().delete_branch(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
