//! Record stores and the atomic-transaction facility.
//!
//! The traits here are the seams the engines operate through: plain
//! read/write record stores for the registries, and the two atomic
//! operations with real invariants (`LedgerStore::apply_movement` and
//! `LoanStore::settle_repayment`) whose implementations must hold exclusive
//! access to the target row for the whole read-validate-write cycle.
//!
//! Two implementations ship: [`InMemoryBank`] (keyed per-row async locks,
//! dev/test) and [`PgBank`] (Postgres, row locks via `SELECT ... FOR UPDATE`
//! inside a transaction). In both, the balance guard and the storage
//! transaction are the same mechanism; there is no second application-level
//! lock to deadlock against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use corebank_core::{
    AccountId, BankId, BranchId, CustomerId, DomainResult, LoanId, Money, MovementId, RepaymentId,
};
use corebank_ledger::{Account, HolderLink, Movement, MovementKind, NewAccount};
use corebank_lending::{Loan, NewLoan, Repayment};
use corebank_registry::{Bank, Branch, Customer, NewBank, NewBranch, NewCustomer};

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::InMemoryBank;
pub use postgres::PgBank;

/// Read/write store for the simple registries: banks, branches, customers.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn insert_bank(&self, input: NewBank) -> DomainResult<Bank>;
    async fn bank(&self, id: BankId) -> DomainResult<Bank>;
    async fn banks(&self) -> DomainResult<Vec<Bank>>;
    async fn update_bank(
        &self,
        id: BankId,
        name: Option<String>,
        code: Option<String>,
        location: Option<String>,
    ) -> DomainResult<Bank>;
    async fn delete_bank(&self, id: BankId) -> DomainResult<()>;

    async fn insert_branch(&self, input: NewBranch) -> DomainResult<Branch>;
    async fn branch(&self, id: BranchId) -> DomainResult<Branch>;
    async fn branches(&self) -> DomainResult<Vec<Branch>>;
    async fn branches_of_bank(&self, bank_id: BankId) -> DomainResult<Vec<Branch>>;
    async fn update_branch(
        &self,
        id: BranchId,
        name: Option<String>,
        code: Option<String>,
        manager: Option<String>,
    ) -> DomainResult<Branch>;
    async fn delete_branch(&self, id: BranchId) -> DomainResult<()>;

    async fn insert_customer(&self, input: NewCustomer) -> DomainResult<Customer>;
    async fn customer(&self, id: CustomerId) -> DomainResult<Customer>;
    async fn customers(&self) -> DomainResult<Vec<Customer>>;
    async fn update_customer(
        &self,
        id: CustomerId,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> DomainResult<Customer>;
    async fn delete_customer(&self, id: CustomerId) -> DomainResult<()>;
}

/// Store for accounts and their holder links.
///
/// `attach_holder` and `detach_holder` are atomic units: the duplicate/count
/// inspection, the link write and the classification write all happen under
/// the account's exclusive guard.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn open_account(&self, input: NewAccount) -> DomainResult<Account>;
    async fn account(&self, id: AccountId) -> DomainResult<Account>;
    async fn accounts(&self) -> DomainResult<Vec<Account>>;
    async fn accounts_of_customer(&self, customer_id: CustomerId) -> DomainResult<Vec<Account>>;
    async fn update_account(
        &self,
        id: AccountId,
        account_number: Option<String>,
        interest_rate: Option<f64>,
    ) -> DomainResult<Account>;
    async fn delete_account(&self, id: AccountId) -> DomainResult<()>;

    async fn holders(&self, account_id: AccountId) -> DomainResult<Vec<HolderLink>>;
    async fn attach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<HolderLink>;
    async fn detach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<()>;
}

/// The append-only movement ledger plus the balance mutation facility.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// One atomic unit: acquire the account's exclusive guard (`NotFound` if
    /// the account is absent), validate the movement against the current
    /// balance, write the new balance and append exactly one movement row.
    /// Either both writes commit or neither does.
    async fn apply_movement(
        &self,
        account_id: AccountId,
        kind: MovementKind,
        amount: Money,
        description: String,
    ) -> DomainResult<Movement>;

    /// All movements for an account, in append order. Never mutates state.
    async fn movements_of_account(&self, account_id: AccountId) -> DomainResult<Vec<Movement>>;
    async fn movements(&self) -> DomainResult<Vec<Movement>>;
    async fn movement(&self, id: MovementId) -> DomainResult<Movement>;
}

/// Store for loans and their repayment history.
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn issue_loan(&self, input: NewLoan) -> DomainResult<Loan>;
    async fn loan(&self, id: LoanId) -> DomainResult<Loan>;
    async fn loans(&self) -> DomainResult<Vec<Loan>>;
    async fn loans_of_customer(&self, customer_id: CustomerId) -> DomainResult<Vec<Loan>>;
    async fn update_loan(
        &self,
        id: LoanId,
        interest_rate: Option<f64>,
        term_months: Option<i32>,
    ) -> DomainResult<Loan>;
    async fn delete_loan(&self, id: LoanId) -> DomainResult<()>;

    /// One atomic unit: acquire the loan's exclusive guard (`NotFound` if the
    /// loan is absent), append the repayment, recompute the cumulative total
    /// including it, and apply the `ongoing -> closed` transition when the
    /// total reaches the principal. Two concurrent repayments crossing the
    /// threshold close the loan exactly once.
    async fn settle_repayment(
        &self,
        loan_id: LoanId,
        amount: Money,
        paid_on: DateTime<Utc>,
    ) -> DomainResult<Repayment>;

    async fn total_repaid(&self, loan_id: LoanId) -> DomainResult<Money>;
    async fn repayments_of_loan(&self, loan_id: LoanId) -> DomainResult<Vec<Repayment>>;
    async fn repayments(&self) -> DomainResult<Vec<Repayment>>;
    async fn repayment(&self, id: RepaymentId) -> DomainResult<Repayment>;
}
