//! Postgres-backed store implementation.
//!
//! The exclusive scope required by the balance guard is a database
//! transaction holding a row lock (`SELECT … FOR UPDATE`): two mutations of
//! the same account serialize on the row, mutations of different accounts
//! proceed in parallel, and the balance write plus the movement append
//! commit together or not at all. Loan settlement locks the loan row the
//! same way.
//!
//! ## Error mapping
//!
//! | SQLSTATE | Meaning                  | DomainError                          |
//! |----------|--------------------------|--------------------------------------|
//! | 23505    | unique violation         | `Validation` (duplicate value)       |
//! | 23503    | foreign key violation    | `NotFound` on inserts (missing parent), `Validation` on deletes (still referenced) |
//! | 23514    | check violation          | `Validation`                         |
//! | other    | anything else            | `Storage`                            |

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use async_trait::async_trait;

use corebank_core::{
    AccountId, BankId, BranchId, CustomerId, DomainError, DomainResult, LoanId, Money, MovementId,
    RepaymentId,
};
use corebank_ledger::{
    attach_outcome, detach_outcome, Account, AccountClassification, HolderLink, HolderRole,
    Movement, MovementKind, NewAccount,
};
use corebank_lending::{Loan, LoanStatus, NewLoan, Repayment};
use corebank_registry::{Bank, Branch, Customer, NewBank, NewBranch, NewCustomer};

use super::{AccountStore, LedgerStore, LoanStore, RegistryStore};

/// Postgres implementation of every store trait.
///
/// `PgPool` is internally reference-counted; the store is cheap to clone and
/// `Send + Sync`.
#[derive(Debug, Clone)]
pub struct PgBank {
    pool: PgPool,
}

impl PgBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock an account row for the duration of the surrounding transaction.
    async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        id: AccountId,
    ) -> DomainResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, account_number, branch_id, classification, interest_rate, balance, created_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_account", e))?
        .ok_or(DomainError::NotFound)?;

        AccountRow::from_row(&row)
            .map_err(|e| DomainError::storage(format!("failed to read account row: {e}")))?
            .try_into()
    }

    async fn lock_loan(tx: &mut Transaction<'_, Postgres>, id: LoanId) -> DomainResult<Loan> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, customer_id, principal, interest_rate, start_date, term_months, status
            FROM loans
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_loan", e))?
        .ok_or(DomainError::NotFound)?;

        LoanRow::from_row(&row)
            .map_err(|e| DomainError::storage(format!("failed to read loan row: {e}")))?
            .try_into()
    }

    async fn begin(&self) -> DomainResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

/// Map SQLx errors to the domain taxonomy (see the module docs table).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") | Some("23503") => DomainError::validation(msg),
                _ => DomainError::storage(msg),
            }
        }
        other => DomainError::storage(format!("sqlx error in {operation}: {other}")),
    }
}

/// Insert-path variant: a foreign key violation means a referenced parent
/// record does not exist.
fn map_insert_error(operation: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23503") {
            return DomainError::NotFound;
        }
    }
    map_sqlx_error(operation, err)
}

#[async_trait]
impl RegistryStore for PgBank {
    async fn insert_bank(&self, input: NewBank) -> DomainResult<Bank> {
        let bank = Bank::register(input)?;
        sqlx::query("INSERT INTO banks (id, name, code, location) VALUES ($1, $2, $3, $4)")
            .bind(bank.id.as_uuid())
            .bind(&bank.name)
            .bind(&bank.code)
            .bind(&bank.location)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error("insert_bank", e))?;
        Ok(bank)
    }

    async fn bank(&self, id: BankId) -> DomainResult<Bank> {
        let row = sqlx::query("SELECT id, name, code, location FROM banks WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("bank", e))?
            .ok_or(DomainError::NotFound)?;
        bank_from_row(&row)
    }

    async fn banks(&self) -> DomainResult<Vec<Bank>> {
        let rows = sqlx::query("SELECT id, name, code, location FROM banks ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("banks", e))?;
        rows.iter().map(bank_from_row).collect()
    }

    async fn update_bank(
        &self,
        id: BankId,
        name: Option<String>,
        code: Option<String>,
        location: Option<String>,
    ) -> DomainResult<Bank> {
        let mut tx = self.begin().await?;
        let row = sqlx::query("SELECT id, name, code, location FROM banks WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_bank", e))?
            .ok_or(DomainError::NotFound)?;
        let mut bank = bank_from_row(&row)?;
        bank.update(name, code, location)?;

        sqlx::query("UPDATE banks SET name = $1, code = $2, location = $3 WHERE id = $4")
            .bind(&bank.name)
            .bind(&bank.code)
            .bind(&bank.location)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_bank", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("update_bank", e))?;
        Ok(bank)
    }

    async fn delete_bank(&self, id: BankId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM banks WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_bank", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    async fn insert_branch(&self, input: NewBranch) -> DomainResult<Branch> {
        let branch = Branch::register(input)?;
        sqlx::query(
            "INSERT INTO branches (id, name, code, bank_id, manager) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(branch.id.as_uuid())
        .bind(&branch.name)
        .bind(&branch.code)
        .bind(branch.bank_id.as_uuid())
        .bind(&branch.manager)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error("insert_branch", e))?;
        Ok(branch)
    }

    async fn branch(&self, id: BranchId) -> DomainResult<Branch> {
        let row = sqlx::query("SELECT id, name, code, bank_id, manager FROM branches WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("branch", e))?
            .ok_or(DomainError::NotFound)?;
        branch_from_row(&row)
    }

    async fn branches(&self) -> DomainResult<Vec<Branch>> {
        let rows = sqlx::query("SELECT id, name, code, bank_id, manager FROM branches ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("branches", e))?;
        rows.iter().map(branch_from_row).collect()
    }

    async fn branches_of_bank(&self, bank_id: BankId) -> DomainResult<Vec<Branch>> {
        let rows = sqlx::query(
            "SELECT id, name, code, bank_id, manager FROM branches WHERE bank_id = $1 ORDER BY id",
        )
        .bind(bank_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("branches_of_bank", e))?;
        rows.iter().map(branch_from_row).collect()
    }

    async fn update_branch(
        &self,
        id: BranchId,
        name: Option<String>,
        code: Option<String>,
        manager: Option<String>,
    ) -> DomainResult<Branch> {
        let mut tx = self.begin().await?;
        let row = sqlx::query(
            "SELECT id, name, code, bank_id, manager FROM branches WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_branch", e))?
        .ok_or(DomainError::NotFound)?;
        let mut branch = branch_from_row(&row)?;
        branch.update(name, code, manager)?;

        sqlx::query("UPDATE branches SET name = $1, code = $2, manager = $3 WHERE id = $4")
            .bind(&branch.name)
            .bind(&branch.code)
            .bind(&branch.manager)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_branch", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("update_branch", e))?;
        Ok(branch)
    }

    async fn delete_branch(&self, id: BranchId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_branch", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    async fn insert_customer(&self, input: NewCustomer) -> DomainResult<Customer> {
        let customer = Customer::register(input)?;
        sqlx::query(
            "INSERT INTO customers (id, first_name, last_name, email, phone) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error("insert_customer", e))?;
        Ok(customer)
    }

    async fn customer(&self, id: CustomerId) -> DomainResult<Customer> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, phone FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("customer", e))?
        .ok_or(DomainError::NotFound)?;
        customer_from_row(&row)
    }

    async fn customers(&self) -> DomainResult<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, email, phone FROM customers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("customers", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> DomainResult<Customer> {
        let mut tx = self.begin().await?;
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, phone FROM customers WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?
        .ok_or(DomainError::NotFound)?;
        let mut customer = customer_from_row(&row)?;
        customer.update(first_name, last_name, email, phone)?;

        sqlx::query(
            "UPDATE customers SET first_name = $1, last_name = $2, email = $3, phone = $4 WHERE id = $5",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_customer", e))?;
        Ok(customer)
    }

    async fn delete_customer(&self, id: CustomerId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgBank {
    async fn open_account(&self, input: NewAccount) -> DomainResult<Account> {
        let account = Account::open(input, Utc::now())?;
        sqlx::query(
            r#"
            INSERT INTO accounts (id, account_number, branch_id, classification, interest_rate, balance, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.account_number)
        .bind(account.branch_id.as_uuid())
        .bind(account.classification.as_str())
        .bind(account.interest_rate)
        .bind(account.balance.cents())
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error("open_account", e))?;
        Ok(account)
    }

    async fn account(&self, id: AccountId) -> DomainResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, account_number, branch_id, classification, interest_rate, balance, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("account", e))?
        .ok_or(DomainError::NotFound)?;
        AccountRow::from_row(&row)
            .map_err(|e| DomainError::storage(format!("failed to read account row: {e}")))?
            .try_into()
    }

    async fn accounts(&self) -> DomainResult<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_number, branch_id, classification, interest_rate, balance, created_at
            FROM accounts
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts", e))?;

        rows.iter()
            .map(|row| {
                AccountRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read account row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    async fn accounts_of_customer(&self, customer_id: CustomerId) -> DomainResult<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.account_number, a.branch_id, a.classification, a.interest_rate, a.balance, a.created_at
            FROM accounts a
            JOIN account_holders h ON h.account_id = a.id
            WHERE h.customer_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts_of_customer", e))?;

        rows.iter()
            .map(|row| {
                AccountRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read account row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    async fn update_account(
        &self,
        id: AccountId,
        account_number: Option<String>,
        interest_rate: Option<f64>,
    ) -> DomainResult<Account> {
        let mut tx = self.begin().await?;
        let mut account = Self::lock_account(&mut tx, id).await?;
        account.update_metadata(account_number, interest_rate)?;

        sqlx::query("UPDATE accounts SET account_number = $1, interest_rate = $2 WHERE id = $3")
            .bind(&account.account_number)
            .bind(account.interest_rate)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_account", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_account", e))?;
        Ok(account)
    }

    async fn delete_account(&self, id: AccountId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    async fn holders(&self, account_id: AccountId) -> DomainResult<Vec<HolderLink>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, customer_id, role, created_at
            FROM account_holders
            WHERE account_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("holders", e))?;

        rows.iter()
            .map(|row| {
                HolderLinkRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read holder row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    #[instrument(skip(self), fields(account_id = %account_id, customer_id = %customer_id), err)]
    async fn attach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<HolderLink> {
        let mut tx = self.begin().await?;
        // The row lock is the guard; everything below happens inside it.
        let _account = Self::lock_account(&mut tx, account_id).await?;

        let existing = sqlx::query(
            "SELECT 1 AS present FROM account_holders WHERE account_id = $1 AND customer_id = $2",
        )
        .bind(account_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("attach_holder", e))?;
        if existing.is_some() {
            return Err(DomainError::AlreadyLinked);
        }

        let count_row =
            sqlx::query("SELECT COUNT(*) AS links FROM account_holders WHERE account_id = $1")
                .bind(account_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("attach_holder", e))?;
        let count: i64 = count_row
            .try_get("links")
            .map_err(|e| DomainError::storage(format!("failed to read link count: {e}")))?;

        let (role, classification) = attach_outcome(count as usize);
        let link = HolderLink::forge(account_id, customer_id, role, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO account_holders (id, account_id, customer_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(link.id.as_uuid())
        .bind(account_id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(link.role.as_str())
        .bind(link.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error("attach_holder", e))?;

        sqlx::query("UPDATE accounts SET classification = $1 WHERE id = $2")
            .bind(classification.as_str())
            .bind(account_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("attach_holder", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("attach_holder", e))?;
        Ok(link)
    }

    #[instrument(skip(self), fields(account_id = %account_id, customer_id = %customer_id), err)]
    async fn detach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<()> {
        let mut tx = self.begin().await?;
        let _account = Self::lock_account(&mut tx, account_id).await?;

        let count_row =
            sqlx::query("SELECT COUNT(*) AS links FROM account_holders WHERE account_id = $1")
                .bind(account_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("detach_holder", e))?;
        let count_before: i64 = count_row
            .try_get("links")
            .map_err(|e| DomainError::storage(format!("failed to read link count: {e}")))?;

        let deleted =
            sqlx::query("DELETE FROM account_holders WHERE account_id = $1 AND customer_id = $2")
                .bind(account_id.as_uuid())
                .bind(customer_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("detach_holder", e))?;
        if deleted.rows_affected() == 0 {
            // Dropping the transaction rolls it back; classification untouched.
            return Err(DomainError::NotFound);
        }

        if let Some(classification) = detach_outcome(count_before as usize) {
            sqlx::query("UPDATE accounts SET classification = $1 WHERE id = $2")
                .bind(classification.as_str())
                .bind(account_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("detach_holder", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("detach_holder", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgBank {
    #[instrument(
        skip(self, description),
        fields(account_id = %account_id, kind = %kind, amount = %amount),
        err
    )]
    async fn apply_movement(
        &self,
        account_id: AccountId,
        kind: MovementKind,
        amount: Money,
        description: String,
    ) -> DomainResult<Movement> {
        let amount = amount.require_positive()?;

        let mut tx = self.begin().await?;
        let account = Self::lock_account(&mut tx, account_id).await?;

        // Validation happens under the row lock; an error drops the
        // transaction and rolls everything back.
        let new_balance = account.balance_after(kind, amount)?;
        let movement = Movement::record(account_id, kind, amount, description, Utc::now());

        sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(new_balance.cents())
            .bind(account_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("apply_movement", e))?;

        sqlx::query(
            r#"
            INSERT INTO movements (id, account_id, kind, amount, description, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(account_id.as_uuid())
        .bind(movement.kind.as_str())
        .bind(movement.amount.cents())
        .bind(&movement.description)
        .bind(movement.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("apply_movement", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("apply_movement", e))?;
        Ok(movement)
    }

    async fn movements_of_account(&self, account_id: AccountId) -> DomainResult<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, kind, amount, description, recorded_at
            FROM movements
            WHERE account_id = $1
            ORDER BY seq
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements_of_account", e))?;

        rows.iter()
            .map(|row| {
                MovementRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read movement row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    async fn movements(&self) -> DomainResult<Vec<Movement>> {
        let rows = sqlx::query(
            "SELECT id, account_id, kind, amount, description, recorded_at FROM movements ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter()
            .map(|row| {
                MovementRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read movement row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    async fn movement(&self, id: MovementId) -> DomainResult<Movement> {
        let row = sqlx::query(
            "SELECT id, account_id, kind, amount, description, recorded_at FROM movements WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement", e))?
        .ok_or(DomainError::NotFound)?;

        MovementRow::from_row(&row)
            .map_err(|e| DomainError::storage(format!("failed to read movement row: {e}")))?
            .try_into()
    }
}

#[async_trait]
impl LoanStore for PgBank {
    async fn issue_loan(&self, input: NewLoan) -> DomainResult<Loan> {
        let loan = Loan::issue(input, Utc::now())?;
        sqlx::query(
            r#"
            INSERT INTO loans (id, account_id, customer_id, principal, interest_rate, start_date, term_months, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(loan.id.as_uuid())
        .bind(loan.account_id.as_uuid())
        .bind(loan.customer_id.as_uuid())
        .bind(loan.principal.cents())
        .bind(loan.interest_rate)
        .bind(loan.start_date)
        .bind(loan.term_months)
        .bind(loan.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error("issue_loan", e))?;
        Ok(loan)
    }

    async fn loan(&self, id: LoanId) -> DomainResult<Loan> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, customer_id, principal, interest_rate, start_date, term_months, status
            FROM loans
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("loan", e))?
        .ok_or(DomainError::NotFound)?;

        LoanRow::from_row(&row)
            .map_err(|e| DomainError::storage(format!("failed to read loan row: {e}")))?
            .try_into()
    }

    async fn loans(&self) -> DomainResult<Vec<Loan>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, customer_id, principal, interest_rate, start_date, term_months, status
            FROM loans
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("loans", e))?;

        rows.iter()
            .map(|row| {
                LoanRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read loan row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    async fn loans_of_customer(&self, customer_id: CustomerId) -> DomainResult<Vec<Loan>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, customer_id, principal, interest_rate, start_date, term_months, status
            FROM loans
            WHERE customer_id = $1
            ORDER BY id
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("loans_of_customer", e))?;

        rows.iter()
            .map(|row| {
                LoanRow::from_row(row)
                    .map_err(|e| DomainError::storage(format!("failed to read loan row: {e}")))?
                    .try_into()
            })
            .collect()
    }

    async fn update_loan(
        &self,
        id: LoanId,
        interest_rate: Option<f64>,
        term_months: Option<i32>,
    ) -> DomainResult<Loan> {
        if let Some(rate) = interest_rate {
            if rate < 0.0 {
                return Err(DomainError::validation("interest rate cannot be negative"));
            }
        }
        if let Some(term) = term_months {
            if term <= 0 {
                return Err(DomainError::validation("term_months must be greater than zero"));
            }
        }

        let mut tx = self.begin().await?;
        let mut loan = Self::lock_loan(&mut tx, id).await?;
        if let Some(rate) = interest_rate {
            loan.interest_rate = rate;
        }
        if let Some(term) = term_months {
            loan.term_months = term;
        }

        sqlx::query("UPDATE loans SET interest_rate = $1, term_months = $2 WHERE id = $3")
            .bind(loan.interest_rate)
            .bind(loan.term_months)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_loan", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("update_loan", e))?;
        Ok(loan)
    }

    async fn delete_loan(&self, id: LoanId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_loan", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(loan_id = %loan_id, amount = %amount), err)]
    async fn settle_repayment(
        &self,
        loan_id: LoanId,
        amount: Money,
        paid_on: DateTime<Utc>,
    ) -> DomainResult<Repayment> {
        let amount = amount.require_positive()?;

        let mut tx = self.begin().await?;
        let mut loan = Self::lock_loan(&mut tx, loan_id).await?;

        let repayment = Repayment::record(loan_id, amount, paid_on);
        sqlx::query(
            "INSERT INTO repayments (id, loan_id, amount, paid_on) VALUES ($1, $2, $3, $4)",
        )
        .bind(repayment.id.as_uuid())
        .bind(loan_id.as_uuid())
        .bind(repayment.amount.cents())
        .bind(repayment.paid_on)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("settle_repayment", e))?;

        let total_row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT AS total FROM repayments WHERE loan_id = $1",
        )
        .bind(loan_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("settle_repayment", e))?;
        let total: i64 = total_row
            .try_get("total")
            .map_err(|e| DomainError::storage(format!("failed to read repaid total: {e}")))?;

        if loan.settled_by(Money::from_cents(total)) && !loan.is_closed() {
            loan.close();
            sqlx::query("UPDATE loans SET status = $1 WHERE id = $2")
                .bind(loan.status.as_str())
                .bind(loan_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("settle_repayment", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("settle_repayment", e))?;
        Ok(repayment)
    }

    async fn total_repaid(&self, loan_id: LoanId) -> DomainResult<Money> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT AS total FROM repayments WHERE loan_id = $1",
        )
        .bind(loan_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("total_repaid", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| DomainError::storage(format!("failed to read repaid total: {e}")))?;
        Ok(Money::from_cents(total))
    }

    async fn repayments_of_loan(&self, loan_id: LoanId) -> DomainResult<Vec<Repayment>> {
        let rows = sqlx::query(
            "SELECT id, loan_id, amount, paid_on FROM repayments WHERE loan_id = $1 ORDER BY id",
        )
        .bind(loan_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("repayments_of_loan", e))?;

        rows.iter().map(repayment_from_row).collect()
    }

    async fn repayments(&self) -> DomainResult<Vec<Repayment>> {
        let rows = sqlx::query("SELECT id, loan_id, amount, paid_on FROM repayments ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("repayments", e))?;
        rows.iter().map(repayment_from_row).collect()
    }

    async fn repayment(&self, id: RepaymentId) -> DomainResult<Repayment> {
        let row = sqlx::query("SELECT id, loan_id, amount, paid_on FROM repayments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("repayment", e))?
            .ok_or(DomainError::NotFound)?;
        repayment_from_row(&row)
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: uuid::Uuid,
    account_number: String,
    branch_id: uuid::Uuid,
    classification: String,
    interest_rate: f64,
    balance: i64,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AccountRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            account_number: row.try_get("account_number")?,
            branch_id: row.try_get("branch_id")?,
            classification: row.try_get("classification")?,
            interest_rate: row.try_get("interest_rate")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = DomainError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let classification = match row.classification.as_str() {
            "savings" => AccountClassification::Savings,
            "joint" => AccountClassification::Joint,
            other => {
                return Err(DomainError::storage(format!(
                    "unknown account classification '{other}'"
                )))
            }
        };
        Ok(Account {
            id: AccountId::from_uuid(row.id),
            account_number: row.account_number,
            branch_id: BranchId::from_uuid(row.branch_id),
            classification,
            interest_rate: row.interest_rate,
            balance: Money::from_cents(row.balance),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct MovementRow {
    id: uuid::Uuid,
    account_id: uuid::Uuid,
    kind: String,
    amount: i64,
    description: String,
    recorded_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            kind: row.try_get("kind")?,
            amount: row.try_get("amount")?,
            description: row.try_get("description")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = DomainError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind: MovementKind = row
            .kind
            .parse()
            .map_err(|_| DomainError::storage(format!("unknown movement kind '{}'", row.kind)))?;
        Ok(Movement {
            id: MovementId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            kind,
            amount: Money::from_cents(row.amount),
            description: row.description,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug)]
struct HolderLinkRow {
    id: uuid::Uuid,
    account_id: uuid::Uuid,
    customer_id: uuid::Uuid,
    role: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for HolderLinkRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(HolderLinkRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            customer_id: row.try_get("customer_id")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<HolderLinkRow> for HolderLink {
    type Error = DomainError;

    fn try_from(row: HolderLinkRow) -> Result<Self, Self::Error> {
        let role = match row.role.as_str() {
            "primary_holder" => HolderRole::PrimaryHolder,
            "joint_holder" => HolderRole::JointHolder,
            other => {
                return Err(DomainError::storage(format!("unknown holder role '{other}'")))
            }
        };
        Ok(HolderLink {
            id: corebank_core::HolderLinkId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct LoanRow {
    id: uuid::Uuid,
    account_id: uuid::Uuid,
    customer_id: uuid::Uuid,
    principal: i64,
    interest_rate: f64,
    start_date: DateTime<Utc>,
    term_months: i32,
    status: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for LoanRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(LoanRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            customer_id: row.try_get("customer_id")?,
            principal: row.try_get("principal")?,
            interest_rate: row.try_get("interest_rate")?,
            start_date: row.try_get("start_date")?,
            term_months: row.try_get("term_months")?,
            status: row.try_get("status")?,
        })
    }
}

impl TryFrom<LoanRow> for Loan {
    type Error = DomainError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "ongoing" => LoanStatus::Ongoing,
            "closed" => LoanStatus::Closed,
            other => return Err(DomainError::storage(format!("unknown loan status '{other}'"))),
        };
        Ok(Loan {
            id: LoanId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            principal: Money::from_cents(row.principal),
            interest_rate: row.interest_rate,
            start_date: row.start_date,
            term_months: row.term_months,
            status,
        })
    }
}

fn bank_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<Bank> {
    Ok(Bank {
        id: BankId::from_uuid(
            row.try_get("id")
                .map_err(|e| DomainError::storage(format!("failed to read bank row: {e}")))?,
        ),
        name: row
            .try_get("name")
            .map_err(|e| DomainError::storage(format!("failed to read bank row: {e}")))?,
        code: row
            .try_get("code")
            .map_err(|e| DomainError::storage(format!("failed to read bank row: {e}")))?,
        location: row
            .try_get("location")
            .map_err(|e| DomainError::storage(format!("failed to read bank row: {e}")))?,
    })
}

fn branch_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<Branch> {
    let read_err = |e: sqlx::Error| DomainError::storage(format!("failed to read branch row: {e}"));
    Ok(Branch {
        id: BranchId::from_uuid(row.try_get("id").map_err(read_err)?),
        name: row.try_get("name").map_err(read_err)?,
        code: row.try_get("code").map_err(read_err)?,
        bank_id: BankId::from_uuid(row.try_get("bank_id").map_err(read_err)?),
        manager: row.try_get("manager").map_err(read_err)?,
    })
}

fn customer_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<Customer> {
    let read_err =
        |e: sqlx::Error| DomainError::storage(format!("failed to read customer row: {e}"));
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get("id").map_err(read_err)?),
        first_name: row.try_get("first_name").map_err(read_err)?,
        last_name: row.try_get("last_name").map_err(read_err)?,
        email: row.try_get("email").map_err(read_err)?,
        phone: row.try_get("phone").map_err(read_err)?,
    })
}

fn repayment_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<Repayment> {
    let read_err =
        |e: sqlx::Error| DomainError::storage(format!("failed to read repayment row: {e}"));
    Ok(Repayment {
        id: RepaymentId::from_uuid(row.try_get("id").map_err(read_err)?),
        loan_id: LoanId::from_uuid(row.try_get("loan_id").map_err(read_err)?),
        amount: Money::from_cents(row.try_get("amount").map_err(read_err)?),
        paid_on: row.try_get("paid_on").map_err(read_err)?,
    })
}
