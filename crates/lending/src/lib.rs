//! `corebank-lending` — loan and repayment domain model.
//!
//! Pure lifecycle and settlement rules; the settlement engine in
//! `corebank-engine` drives them atomically through the stores.

pub mod loan;
pub mod repayment;

pub use loan::{Loan, LoanDetails, LoanStatus, NewLoan};
pub use repayment::Repayment;
