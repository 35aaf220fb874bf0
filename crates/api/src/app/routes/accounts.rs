use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use corebank_ledger::{MovementKind, NewAccount};

use crate::app::dto::{self, parse_account_id, parse_customer_id};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_account).get(list_accounts))
        .route(
            "/:id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route(
            "/:id/customers/:customer_id",
            post(attach_customer).delete(detach_customer),
        )
        .route("/:id/transactions", get(list_account_transactions))
        .route("/:id/deposit", post(deposit))
        .route("/:id/withdraw", post(withdraw))
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewAccount>,
) -> axum::response::Response {
    match services.accounts().open_account(body).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.accounts().accounts().await {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Account detail: account fields plus all linked customers with roles.
pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.account_detail(id).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateAccountRequest>,
) -> axum::response::Response {
    let id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .accounts()
        .update_account(id, body.account_number, body.interest_rate)
        .await
    {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.accounts().delete_account(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn attach_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, customer_id)): Path<(String, String)>,
) -> axum::response::Response {
    let account_id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let customer_id = match parse_customer_id(&customer_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.attach_holder(account_id, customer_id).await {
        Ok(detail) => (StatusCode::CREATED, Json(detail)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn detach_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, customer_id)): Path<(String, String)>,
) -> axum::response::Response {
    let account_id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let customer_id = match parse_customer_id(&customer_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.detach_holder(account_id, customer_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_account_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.movement_history(id).await {
        Ok(movements) => (StatusCode::OK, Json(movements)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .apply_movement(id, MovementKind::Deposit, body.amount, body.description)
        .await
    {
        Ok(movement) => (StatusCode::OK, Json(movement)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let id = match parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .apply_movement(id, MovementKind::Withdrawal, body.amount, body.description)
        .await
    {
        Ok(movement) => (StatusCode::OK, Json(movement)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
