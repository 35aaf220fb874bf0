use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use corebank_core::CustomerId;
use corebank_registry::NewCustomer;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_customer).get(list_customers))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/:id/accounts", get(list_customer_accounts))
        .route("/:id/loans", get(list_customer_loans))
}

fn parse_id(raw: &str) -> Result<CustomerId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id")
    })
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewCustomer>,
) -> axum::response::Response {
    match services.registry().insert_customer(body).await {
        Ok(customer) => (StatusCode::CREATED, Json(customer)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.registry().customers().await {
        Ok(customers) => (StatusCode::OK, Json(customers)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.registry().customer(id).await {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCustomerRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .registry()
        .update_customer(id, body.first_name, body.last_name, body.email, body.phone)
        .await
    {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.registry().delete_customer(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_customer_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.accounts().accounts_of_customer(id).await {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_customer_loans(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.loans().loans_of_customer(id).await {
        Ok(loans) => (StatusCode::OK, Json(loans)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
