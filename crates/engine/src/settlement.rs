use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use corebank_core::{DomainResult, LoanId, Money};
use corebank_infra::LoanStore;
use corebank_lending::{LoanDetails, Repayment};

/// Applies repayments against a loan's outstanding principal and evaluates
/// closure.
#[derive(Debug)]
pub struct SettlementEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for SettlementEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: LoanStore> SettlementEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a repayment.
    ///
    /// `InvalidAmount` is rejected before any write; the store operation runs
    /// the atomic unit (repayment append + cumulative recomputation + the
    /// at-most-once `ongoing -> closed` transition under the loan's guard).
    /// Repaying a closed loan records the repayment and leaves it closed.
    #[instrument(skip(self), fields(loan_id = %loan_id, amount = %amount), err)]
    pub async fn repay(
        &self,
        loan_id: LoanId,
        amount: Money,
        paid_on: DateTime<Utc>,
    ) -> DomainResult<Repayment> {
        let amount = amount.require_positive()?;
        let repayment = self.store.settle_repayment(loan_id, amount, paid_on).await?;
        tracing::debug!(repayment_id = %repayment.id, "repayment settled");
        Ok(repayment)
    }

    /// Loan, total repaid, remaining principal (floored at zero) and the flat
    /// projected-interest figure. Never mutates state.
    pub async fn details(&self, loan_id: LoanId) -> DomainResult<LoanDetails> {
        let loan = self.store.loan(loan_id).await?;
        let total_repaid = self.store.total_repaid(loan_id).await?;
        Ok(loan.details(total_repaid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebank_core::DomainError;
    use corebank_infra::{AccountStore, InMemoryBank, LoanStore, RegistryStore};
    use corebank_ledger::NewAccount;
    use corebank_lending::{LoanStatus, NewLoan};
    use corebank_registry::{NewBank, NewBranch, NewCustomer};

    async fn engine_with_loan(
        principal_cents: i64,
    ) -> (SettlementEngine<InMemoryBank>, Arc<InMemoryBank>, LoanId) {
        let store = Arc::new(InMemoryBank::new());
        let bank = store
            .insert_bank(NewBank {
                name: "Loan Bank".to_string(),
                code: None,
                location: None,
            })
            .await
            .unwrap();
        let branch = store
            .insert_branch(NewBranch {
                name: "HQ".to_string(),
                code: None,
                bank_id: bank.id,
                manager: None,
            })
            .await
            .unwrap();
        let customer = store
            .insert_customer(NewCustomer {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: None,
                phone: None,
            })
            .await
            .unwrap();
        let account = store
            .open_account(NewAccount {
                account_number: "LB-0001".to_string(),
                branch_id: branch.id,
                interest_rate: None,
            })
            .await
            .unwrap();
        let loan = store
            .issue_loan(NewLoan {
                account_id: account.id,
                customer_id: customer.id,
                principal: Money::from_cents(principal_cents),
                interest_rate: Some(10.0),
                start_date: None,
                term_months: 12,
            })
            .await
            .unwrap();
        (SettlementEngine::new(store.clone()), store, loan.id)
    }

    #[tokio::test]
    async fn repay_below_threshold_keeps_loan_ongoing() {
        let (engine, store, loan_id) = engine_with_loan(1_000_00).await;

        engine
            .repay(loan_id, Money::from_cents(400_00), Utc::now())
            .await
            .unwrap();

        assert_eq!(store.loan(loan_id).await.unwrap().status, LoanStatus::Ongoing);
        let details = engine.details(loan_id).await.unwrap();
        assert_eq!(details.total_repaid, Money::from_cents(400_00));
        assert_eq!(details.pending, Money::from_cents(600_00));
        assert_eq!(details.projected_interest, Money::from_cents(60_00));
    }

    #[tokio::test]
    async fn repay_rejects_non_positive_amounts() {
        let (engine, _, loan_id) = engine_with_loan(1_000_00).await;
        let err = engine
            .repay(loan_id, Money::ZERO, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidAmount);
        assert_eq!(
            engine.details(loan_id).await.unwrap().total_repaid,
            Money::ZERO
        );
    }

    #[tokio::test]
    async fn repay_unknown_loan_fails_not_found() {
        let (engine, _, _) = engine_with_loan(1_000_00).await;
        let err = engine
            .repay(LoanId::new(), Money::from_cents(1_00), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[tokio::test]
    async fn overpayment_floors_pending_at_zero_and_stays_closed() {
        let (engine, store, loan_id) = engine_with_loan(1_000_00).await;

        engine
            .repay(loan_id, Money::from_cents(1_200_00), Utc::now())
            .await
            .unwrap();
        assert_eq!(store.loan(loan_id).await.unwrap().status, LoanStatus::Closed);

        // Further repayment is recorded but never reopens the loan.
        engine
            .repay(loan_id, Money::from_cents(10_00), Utc::now())
            .await
            .unwrap();
        let details = engine.details(loan_id).await.unwrap();
        assert_eq!(details.loan.status, LoanStatus::Closed);
        assert_eq!(details.total_repaid, Money::from_cents(1_210_00));
        assert_eq!(details.pending, Money::ZERO);
        assert_eq!(details.projected_interest, Money::ZERO);
    }

    /// Two concurrent repayments of 600 on a principal of 1000: both are
    /// recorded, the loan closes exactly once, total repaid is 1200.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_repayments_close_the_loan_exactly_once() {
        let (engine, store, loan_id) = engine_with_loan(1_000_00).await;

        let a = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .repay(loan_id, Money::from_cents(600_00), Utc::now())
                    .await
            })
        };
        let b = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .repay(loan_id, Money::from_cents(600_00), Utc::now())
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let loan = store.loan(loan_id).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Closed);

        let details = engine.details(loan_id).await.unwrap();
        assert_eq!(details.total_repaid, Money::from_cents(1_200_00));
        assert_eq!(store.repayments_of_loan(loan_id).await.unwrap().len(), 2);
    }
}
