use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use corebank_core::RepaymentId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Repayments are an append-only history: the collection is read-only apart
/// from creation, which runs through the settlement engine so loan closure
/// cannot be bypassed.
pub fn router() -> Router {
    Router::new()
        .route("/", post(create_repayment).get(list_repayments))
        .route("/:id", get(get_repayment))
}

pub async fn create_repayment(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateRepaymentRequest>,
) -> axum::response::Response {
    let paid_on = body.payment_date.unwrap_or_else(Utc::now);
    match services.repay_loan(body.loan_id, body.amount, paid_on).await {
        Ok(repayment) => (StatusCode::CREATED, Json(repayment)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_repayments(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.loans().repayments().await {
        Ok(repayments) => (StatusCode::OK, Json(repayments)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_repayment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RepaymentId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid repayment id")
        }
    };
    match services.loans().repayment(id).await {
        Ok(repayment) => (StatusCode::OK, Json(repayment)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
