use axum::Router;

pub mod accounts;
pub mod banks;
pub mod branches;
pub mod customers;
pub mod loans;
pub mod repayments;
pub mod system;
pub mod transactions;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/banks", banks::router())
        .nest("/branches", branches::router())
        .nest("/customers", customers::router())
        .nest("/accounts", accounts::router())
        .nest("/loans", loans::router())
        .nest("/repayments", repayments::router())
        .nest("/transactions", transactions::router())
}
