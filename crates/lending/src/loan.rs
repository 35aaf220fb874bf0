use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corebank_core::{AccountId, CustomerId, DomainError, DomainResult, Entity, LoanId, Money};

/// Interest rate applied when a loan is issued without one.
const DEFAULT_INTEREST_RATE: f64 = 12.0;

/// Loan status lifecycle. The only transition is `ongoing -> closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Ongoing,
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Ongoing => "ongoing",
            LoanStatus::Closed => "closed",
        }
    }
}

/// A loan issued against an account to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub account_id: AccountId,
    pub customer_id: CustomerId,
    pub principal: Money,
    pub interest_rate: f64,
    pub start_date: DateTime<Utc>,
    pub term_months: i32,
    pub status: LoanStatus,
}

/// Input for issuing a loan. Omitted fields take the issuing defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewLoan {
    pub account_id: AccountId,
    pub customer_id: CustomerId,
    pub principal: Money,
    pub interest_rate: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub term_months: i32,
}

impl Loan {
    pub fn issue(input: NewLoan, issued_at: DateTime<Utc>) -> DomainResult<Self> {
        let principal = input.principal.require_positive()?;
        if input.term_months <= 0 {
            return Err(DomainError::validation("term_months must be greater than zero"));
        }
        let interest_rate = input.interest_rate.unwrap_or(DEFAULT_INTEREST_RATE);
        if interest_rate < 0.0 {
            return Err(DomainError::validation("interest rate cannot be negative"));
        }

        Ok(Self {
            id: LoanId::new(),
            account_id: input.account_id,
            customer_id: input.customer_id,
            principal,
            interest_rate,
            start_date: input.start_date.unwrap_or(issued_at),
            term_months: input.term_months,
            status: LoanStatus::Ongoing,
        })
    }

    /// Whether the cumulative repaid amount settles the loan.
    pub fn settled_by(&self, total_repaid: Money) -> bool {
        total_repaid >= self.principal
    }

    /// Transition to `closed`. Idempotent by construction: once closed a
    /// loan stays closed, so the transition is applied at most once.
    pub fn close(&mut self) {
        self.status = LoanStatus::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.status == LoanStatus::Closed
    }

    /// Settlement summary for the read path.
    ///
    /// Pending principal is floored at zero; projected interest is the flat
    /// non-amortizing figure `pending * rate / 100`.
    pub fn details(&self, total_repaid: Money) -> LoanDetails {
        let pending = self.principal.saturating_sub_floor_zero(total_repaid);
        let projected_interest =
            Money::from_cents((pending.cents() as f64 * self.interest_rate / 100.0).round() as i64);

        LoanDetails {
            loan: self.clone(),
            total_repaid,
            pending,
            projected_interest,
        }
    }
}

impl Entity for Loan {
    type Id = LoanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Loan plus derived settlement figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanDetails {
    pub loan: Loan,
    pub total_repaid: Money,
    pub pending: Money,
    pub projected_interest: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_loan(principal_cents: i64, rate: Option<f64>) -> Loan {
        Loan::issue(
            NewLoan {
                account_id: AccountId::new(),
                customer_id: CustomerId::new(),
                principal: Money::from_cents(principal_cents),
                interest_rate: rate,
                start_date: None,
                term_months: 12,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn issue_applies_defaults() {
        let loan = issue_loan(1_000_00, None);
        assert_eq!(loan.interest_rate, 12.0);
        assert_eq!(loan.status, LoanStatus::Ongoing);
    }

    #[test]
    fn issue_rejects_non_positive_principal_and_term() {
        let err = Loan::issue(
            NewLoan {
                account_id: AccountId::new(),
                customer_id: CustomerId::new(),
                principal: Money::ZERO,
                interest_rate: None,
                start_date: None,
                term_months: 12,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::InvalidAmount);

        let err = Loan::issue(
            NewLoan {
                account_id: AccountId::new(),
                customer_id: CustomerId::new(),
                principal: Money::from_cents(100),
                interest_rate: None,
                start_date: None,
                term_months: 0,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn settled_exactly_at_principal() {
        let loan = issue_loan(1_000_00, None);
        assert!(!loan.settled_by(Money::from_cents(999_99)));
        assert!(loan.settled_by(Money::from_cents(1_000_00)));
        assert!(loan.settled_by(Money::from_cents(1_200_00)));
    }

    #[test]
    fn details_floor_pending_at_zero() {
        let loan = issue_loan(1_000_00, Some(10.0));
        let details = loan.details(Money::from_cents(1_200_00));
        assert_eq!(details.pending, Money::ZERO);
        assert_eq!(details.projected_interest, Money::ZERO);
    }

    #[test]
    fn details_project_flat_interest_on_pending() {
        let loan = issue_loan(1_000_00, Some(10.0));
        let details = loan.details(Money::from_cents(400_00));
        assert_eq!(details.pending, Money::from_cents(600_00));
        assert_eq!(details.projected_interest, Money::from_cents(60_00));
    }
}
