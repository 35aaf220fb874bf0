use std::sync::Arc;

use tracing::instrument;

use corebank_core::{AccountId, DomainResult, Money};
use corebank_infra::LedgerStore;
use corebank_ledger::{Movement, MovementKind};

/// Validates and applies balance movements, producing ledger records.
///
/// Cheap to clone; engines share the underlying store.
#[derive(Debug)]
pub struct MovementEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for MovementEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: LedgerStore> MovementEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply one movement to an account.
    ///
    /// `InvalidAmount` is rejected before any write. The store operation then
    /// runs the atomic unit: guard acquisition (`NotFound` for unknown
    /// accounts), the sufficient-balance check for debits
    /// (`InsufficientFunds`, no side effect), the balance write and the
    /// single movement append.
    #[instrument(
        skip(self, description),
        fields(account_id = %account_id, kind = %kind, amount = %amount),
        err
    )]
    pub async fn apply(
        &self,
        account_id: AccountId,
        kind: MovementKind,
        amount: Money,
        description: String,
    ) -> DomainResult<Movement> {
        let amount = amount.require_positive()?;
        let movement = self
            .store
            .apply_movement(account_id, kind, amount, description)
            .await?;
        tracing::debug!(movement_id = %movement.id, "movement applied");
        Ok(movement)
    }

    /// Movement history for an account, oldest first. Never mutates state.
    pub async fn history(&self, account_id: AccountId) -> DomainResult<Vec<Movement>> {
        self.store.movements_of_account(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebank_core::DomainError;
    use corebank_infra::{AccountStore, InMemoryBank, RegistryStore};
    use corebank_ledger::NewAccount;
    use corebank_registry::{NewBank, NewBranch};

    async fn engine_with_account() -> (MovementEngine<InMemoryBank>, Arc<InMemoryBank>, AccountId) {
        let store = Arc::new(InMemoryBank::new());
        let bank = store
            .insert_bank(NewBank {
                name: "Engine Bank".to_string(),
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
        let account = store
            .open_account(NewAccount {
                account_number: "EB-0001".to_string(),
                branch_id: branch.id,
                interest_rate: None,
            })
            .await
            .unwrap();
        (MovementEngine::new(store.clone()), store, account.id)
    }

    #[tokio::test]
    async fn deposit_withdraw_scenario() {
        let (engine, store, account_id) = engine_with_account().await;

        // deposit 100 on balance 0 -> balance 100, one deposit movement
        let movement = engine
            .apply(
                account_id,
                MovementKind::Deposit,
                Money::from_cents(100_00),
                "salary".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(movement.kind, MovementKind::Deposit);
        assert_eq!(movement.amount, Money::from_cents(100_00));
        assert_eq!(
            store.account(account_id).await.unwrap().balance,
            Money::from_cents(100_00)
        );

        // withdraw 150 -> InsufficientFunds, balance unchanged
        let err = engine
            .apply(
                account_id,
                MovementKind::Withdrawal,
                Money::from_cents(150_00),
                String::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::InsufficientFunds);
        assert_eq!(
            store.account(account_id).await.unwrap().balance,
            Money::from_cents(100_00)
        );

        // withdraw 100 -> balance 0, second movement
        engine
            .apply(
                account_id,
                MovementKind::Withdrawal,
                Money::from_cents(100_00),
                String::new(),
            )
            .await
            .unwrap();
        assert_eq!(store.account(account_id).await.unwrap().balance, Money::ZERO);

        let history = engine.history(account_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Deposit);
        assert_eq!(history[1].kind, MovementKind::Withdrawal);
        assert_eq!(history[1].amount, Money::from_cents(100_00));
    }

    #[tokio::test]
    async fn invalid_amount_is_rejected_before_any_write() {
        let (engine, _, account_id) = engine_with_account().await;

        for cents in [0, -100] {
            let err = engine
                .apply(
                    account_id,
                    MovementKind::Deposit,
                    Money::from_cents(cents),
                    String::new(),
                )
                .await
                .unwrap_err();
            assert_eq!(err, DomainError::InvalidAmount);
        }
        assert!(engine.history(account_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_account_fails_not_found() {
        let (engine, _, _) = engine_with_account().await;
        let err = engine
            .apply(
                AccountId::new(),
                MovementKind::Deposit,
                Money::from_cents(1_00),
                String::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[tokio::test]
    async fn history_count_matches_successful_applies() {
        let (engine, _, account_id) = engine_with_account().await;

        let mut successes = 0usize;
        let amounts = [50_00i64, 20_00, 200_00, 10_00, 500_00, 60_00];
        for (i, cents) in amounts.into_iter().enumerate() {
            let kind = if i % 2 == 0 {
                MovementKind::Deposit
            } else {
                MovementKind::Withdrawal
            };
            if engine
                .apply(account_id, kind, Money::from_cents(cents), String::new())
                .await
                .is_ok()
            {
                successes += 1;
            }
        }

        assert_eq!(engine.history(account_id).await.unwrap().len(), successes);
    }

    /// Concurrent withdrawals totalling more than the balance: exactly
    /// enough succeed to exhaust the balance, the rest fail, and the final
    /// balance never goes negative.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_withdrawals_never_overdraw() {
        let (engine, store, account_id) = engine_with_account().await;

        engine
            .apply(
                account_id,
                MovementKind::Deposit,
                Money::from_cents(100_00),
                String::new(),
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .apply(
                        account_id,
                        MovementKind::Withdrawal,
                        Money::from_cents(30_00),
                        String::new(),
                    )
                    .await
            }));
        }

        let mut ok = 0usize;
        let mut refused = 0usize;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DomainError::InsufficientFunds) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        // 100.00 / 30.00 -> exactly 3 withdrawals fit.
        assert_eq!(ok, 3);
        assert_eq!(refused, 7);

        let account = store.account(account_id).await.unwrap();
        assert_eq!(account.balance, Money::from_cents(10_00));

        // 1 deposit + 3 successful withdrawals; refused attempts left no record.
        assert_eq!(engine.history(account_id).await.unwrap().len(), 4);
    }

    /// Mutations on different accounts do not serialize against each other;
    /// each account's ledger stays internally consistent.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn independent_accounts_mutate_in_parallel() {
        let (engine, store, first) = engine_with_account().await;
        let branch_id = store.accounts().await.unwrap()[0].branch_id;
        let second = store
            .open_account(NewAccount {
                account_number: "EB-0002".to_string(),
                branch_id,
                interest_rate: None,
            })
            .await
            .unwrap()
            .id;

        let mut handles = Vec::new();
        for account_id in [first, second] {
            for _ in 0..50 {
                let engine = engine.clone();
                handles.push(tokio::spawn(async move {
                    engine
                        .apply(
                            account_id,
                            MovementKind::Deposit,
                            Money::from_cents(1_00),
                            String::new(),
                        )
                        .await
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for account_id in [first, second] {
            assert_eq!(
                store.account(account_id).await.unwrap().balance,
                Money::from_cents(50_00)
            );
            assert_eq!(engine.history(account_id).await.unwrap().len(), 50);
        }
    }
}
