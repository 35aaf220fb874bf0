use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use corebank_core::LoanId;
use corebank_lending::NewLoan;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_loan).get(list_loans))
        .route("/:id", get(get_loan).put(update_loan).delete(delete_loan))
        .route("/:id/details", get(loan_details))
        .route("/:id/repay", post(repay_loan))
}

fn parse_id(raw: &str) -> Result<LoanId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid loan id"))
}

pub async fn issue_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewLoan>,
) -> axum::response::Response {
    match services.loans().issue_loan(body).await {
        Ok(loan) => (StatusCode::CREATED, Json(loan)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_loans(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.loans().loans().await {
        Ok(loans) => (StatusCode::OK, Json(loans)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.loans().loan(id).await {
        Ok(loan) => (StatusCode::OK, Json(loan)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateLoanRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .loans()
        .update_loan(id, body.interest_rate, body.term_months)
        .await
    {
        Ok(loan) => (StatusCode::OK, Json(loan)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.loans().delete_loan(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Loan, total repaid, pending principal and projected interest.
pub async fn loan_details(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.loan_details(id).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn repay_loan(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RepayRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let paid_on = body.payment_date.unwrap_or_else(Utc::now);
    match services.repay_loan(id, body.amount, paid_on).await {
        Ok(repayment) => (StatusCode::OK, Json(repayment)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
