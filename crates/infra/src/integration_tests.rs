//! Cross-store integration tests against the in-memory backend.

use chrono::Utc;

use corebank_core::{DomainError, Money};
use corebank_ledger::{AccountClassification, MovementKind, NewAccount};
use corebank_lending::{LoanStatus, NewLoan};
use corebank_registry::{NewBank, NewBranch, NewCustomer};

use crate::store::{AccountStore, InMemoryBank, LedgerStore, LoanStore, RegistryStore};

struct Fixture {
    store: InMemoryBank,
    account_id: corebank_core::AccountId,
    customer_id: corebank_core::CustomerId,
}

async fn fixture() -> Fixture {
    let store = InMemoryBank::new();
    let bank = store
        .insert_bank(NewBank {
            name: "Integration Bank".to_string(),
            code: Some("IB".to_string()),
            location: None,
        })
        .await
        .unwrap();
    let branch = store
        .insert_branch(NewBranch {
            name: "Main Street".to_string(),
            code: None,
            bank_id: bank.id,
            manager: Some("M. Diaz".to_string()),
        })
        .await
        .unwrap();
    let customer = store
        .insert_customer(NewCustomer {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
        })
        .await
        .unwrap();
    let account = store
        .open_account(NewAccount {
            account_number: "IB-0001".to_string(),
            branch_id: branch.id,
            interest_rate: Some(1.5),
        })
        .await
        .unwrap();

    Fixture {
        store,
        account_id: account.id,
        customer_id: customer.id,
    }
}

#[tokio::test]
async fn movement_history_matches_successful_applies() {
    let fx = fixture().await;
    let store = &fx.store;

    store
        .apply_movement(fx.account_id, MovementKind::Deposit, Money::from_cents(100_00), "pay".into())
        .await
        .unwrap();
    // Refused: must leave no trace.
    store
        .apply_movement(fx.account_id, MovementKind::Withdrawal, Money::from_cents(150_00), "rent".into())
        .await
        .unwrap_err();
    store
        .apply_movement(fx.account_id, MovementKind::Withdrawal, Money::from_cents(100_00), "rent".into())
        .await
        .unwrap();

    let history = store.movements_of_account(fx.account_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, MovementKind::Deposit);
    assert_eq!(history[1].kind, MovementKind::Withdrawal);
    assert!(history[0].recorded_at <= history[1].recorded_at);

    let account = store.account(fx.account_id).await.unwrap();
    assert_eq!(account.balance, Money::ZERO);
}

#[tokio::test]
async fn classification_walks_the_link_cardinality() {
    let fx = fixture().await;
    let store = &fx.store;

    let second = store
        .insert_customer(NewCustomer {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: None,
            phone: None,
        })
        .await
        .unwrap();

    // savings -> joint -> savings -> joint
    store.attach_holder(fx.account_id, fx.customer_id).await.unwrap();
    assert_eq!(
        store.account(fx.account_id).await.unwrap().classification,
        AccountClassification::Savings
    );

    store.attach_holder(fx.account_id, second.id).await.unwrap();
    assert_eq!(
        store.account(fx.account_id).await.unwrap().classification,
        AccountClassification::Joint
    );

    store.detach_holder(fx.account_id, second.id).await.unwrap();
    assert_eq!(
        store.account(fx.account_id).await.unwrap().classification,
        AccountClassification::Savings
    );

    store.attach_holder(fx.account_id, second.id).await.unwrap();
    assert_eq!(
        store.account(fx.account_id).await.unwrap().classification,
        AccountClassification::Joint
    );
}

#[tokio::test]
async fn duplicate_attach_is_rejected_without_side_effects() {
    let fx = fixture().await;
    let store = &fx.store;

    store.attach_holder(fx.account_id, fx.customer_id).await.unwrap();
    let err = store
        .attach_holder(fx.account_id, fx.customer_id)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::AlreadyLinked);
    assert_eq!(store.holders(fx.account_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn settlement_closes_loan_exactly_at_threshold() {
    let fx = fixture().await;
    let store = &fx.store;

    let loan = store
        .issue_loan(NewLoan {
            account_id: fx.account_id,
            customer_id: fx.customer_id,
            principal: Money::from_cents(1_000_00),
            interest_rate: Some(10.0),
            start_date: None,
            term_months: 12,
        })
        .await
        .unwrap();

    store
        .settle_repayment(loan.id, Money::from_cents(400_00), Utc::now())
        .await
        .unwrap();
    assert_eq!(store.loan(loan.id).await.unwrap().status, LoanStatus::Ongoing);

    store
        .settle_repayment(loan.id, Money::from_cents(600_00), Utc::now())
        .await
        .unwrap();
    assert_eq!(store.loan(loan.id).await.unwrap().status, LoanStatus::Closed);

    // Repaying further never reopens it.
    store
        .settle_repayment(loan.id, Money::from_cents(50_00), Utc::now())
        .await
        .unwrap();
    assert_eq!(store.loan(loan.id).await.unwrap().status, LoanStatus::Closed);
    assert_eq!(
        store.total_repaid(loan.id).await.unwrap(),
        Money::from_cents(1_050_00)
    );
}

#[tokio::test]
async fn deleting_a_loan_cascades_its_repayments() {
    let fx = fixture().await;
    let store = &fx.store;

    let loan = store
        .issue_loan(NewLoan {
            account_id: fx.account_id,
            customer_id: fx.customer_id,
            principal: Money::from_cents(500_00),
            interest_rate: None,
            start_date: None,
            term_months: 6,
        })
        .await
        .unwrap();
    store
        .settle_repayment(loan.id, Money::from_cents(100_00), Utc::now())
        .await
        .unwrap();

    store.delete_loan(loan.id).await.unwrap();
    assert!(store.repayments().await.unwrap().is_empty());
    assert_eq!(store.loan(loan.id).await.unwrap_err(), DomainError::NotFound);
}

#[tokio::test]
async fn customer_with_loans_cannot_be_deleted() {
    let fx = fixture().await;
    let store = &fx.store;

    store
        .issue_loan(NewLoan {
            account_id: fx.account_id,
            customer_id: fx.customer_id,
            principal: Money::from_cents(500_00),
            interest_rate: None,
            start_date: None,
            term_months: 6,
        })
        .await
        .unwrap();

    let err = store.delete_customer(fx.customer_id).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert!(store.customer(fx.customer_id).await.is_ok());
}
