use chrono::{DateTime, Utc};
use serde::Deserialize;

use corebank_core::{AccountId, CustomerId, LoanId, Money};

// Creation bodies deserialize straight into the domain input types
// (`NewBank`, `NewAccount`, `NewLoan`, …); only the shapes that differ from
// the domain live here.

#[derive(Debug, Deserialize)]
pub struct UpdateBankRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub manager: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Metadata-only account update; balance and classification are owned by the
/// movement engine and the relationship manager.
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub account_number: Option<String>,
    pub interest_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLoanRequest {
    pub interest_rate: Option<f64>,
    pub term_months: Option<i32>,
}

/// Body for deposit/withdraw endpoints. Amounts are integer minor units.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Money,
    #[serde(default)]
    pub description: String,
}

/// Body for `POST /transactions`: a movement of any kind.
#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub account_id: AccountId,
    pub transaction_type: String,
    pub amount: Money,
    #[serde(default)]
    pub description: String,
}

/// Body for `POST /loans/:id/repay`. Payment date defaults to now.
#[derive(Debug, Deserialize)]
pub struct RepayRequest {
    pub amount: Money,
    pub payment_date: Option<DateTime<Utc>>,
}

/// Body for `POST /repayments`; routed through the settlement engine.
#[derive(Debug, Deserialize)]
pub struct CreateRepaymentRequest {
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_date: Option<DateTime<Utc>>,
}

pub fn parse_account_id(raw: &str) -> Result<AccountId, axum::response::Response> {
    raw.parse().map_err(|_| {
        super::errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            "invalid account id",
        )
    })
}

pub fn parse_customer_id(raw: &str) -> Result<CustomerId, axum::response::Response> {
    raw.parse().map_err(|_| {
        super::errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_id",
            "invalid customer id",
        )
    })
}
