use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use corebank_core::{
    AccountId, BankId, BranchId, CustomerId, DomainError, DomainResult, LoanId, Money, MovementId,
    RepaymentId,
};
use corebank_ledger::{
    attach_outcome, detach_outcome, Account, HolderLink, Movement, MovementKind, NewAccount,
};
use corebank_lending::{Loan, NewLoan, Repayment};
use corebank_registry::{Bank, Branch, Customer, NewBank, NewBranch, NewCustomer};

use super::{AccountStore, LedgerStore, LoanStore, RegistryStore};

/// In-memory implementation of every store trait.
///
/// Intended for dev/test. Accounts and loans each live behind their own
/// async mutex; that per-row mutex is the balance guard: operations on the
/// same row serialize for the whole read-validate-write cycle while
/// different rows proceed in parallel. Table maps are only write-locked for
/// the brief moment a committed change is applied, never across an await.
///
/// Lock order is always row guard first, then table locks; nothing acquires
/// a row guard while holding a table lock, so the two levels cannot
/// deadlock.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    banks: RwLock<HashMap<BankId, Bank>>,
    branches: RwLock<HashMap<BranchId, Branch>>,
    customers: RwLock<HashMap<CustomerId, Customer>>,
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<Account>>>>,
    account_numbers: RwLock<HashMap<String, AccountId>>,
    links: RwLock<Vec<HolderLink>>,
    movements: RwLock<Vec<Movement>>,
    loans: RwLock<HashMap<LoanId, Arc<Mutex<Loan>>>>,
    repayments: RwLock<Vec<Repayment>>,
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::storage("lock poisoned")
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the guard slot for an account, or `NotFound`.
    fn account_slot(&self, id: AccountId) -> DomainResult<Arc<Mutex<Account>>> {
        self.accounts
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    fn loan_slot(&self, id: LoanId) -> DomainResult<Arc<Mutex<Loan>>> {
        self.loans
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    /// A row can be deleted between slot lookup and guard acquisition; the
    /// guard holder re-checks presence before writing anything.
    fn account_still_present(&self, id: AccountId) -> DomainResult<()> {
        if self.accounts.read().map_err(poisoned)?.contains_key(&id) {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    fn loan_still_present(&self, id: LoanId) -> DomainResult<()> {
        if self.loans.read().map_err(poisoned)?.contains_key(&id) {
            Ok(())
        } else {
            Err(DomainError::NotFound)
        }
    }

    fn link_count(&self, account_id: AccountId) -> DomainResult<usize> {
        Ok(self
            .links
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|l| l.account_id == account_id)
            .count())
    }
}

#[async_trait]
impl RegistryStore for InMemoryBank {
    async fn insert_bank(&self, input: NewBank) -> DomainResult<Bank> {
        let bank = Bank::register(input)?;
        let mut banks = self.banks.write().map_err(poisoned)?;
        if banks.values().any(|b| b.name == bank.name) {
            return Err(DomainError::validation("bank name already exists"));
        }
        banks.insert(bank.id, bank.clone());
        Ok(bank)
    }

    async fn bank(&self, id: BankId) -> DomainResult<Bank> {
        self.banks
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn banks(&self) -> DomainResult<Vec<Bank>> {
        let mut banks: Vec<Bank> = self.banks.read().map_err(poisoned)?.values().cloned().collect();
        banks.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(banks)
    }

    async fn update_bank(
        &self,
        id: BankId,
        name: Option<String>,
        code: Option<String>,
        location: Option<String>,
    ) -> DomainResult<Bank> {
        let mut banks = self.banks.write().map_err(poisoned)?;
        let bank = banks.get_mut(&id).ok_or(DomainError::NotFound)?;
        bank.update(name, code, location)?;
        Ok(bank.clone())
    }

    async fn delete_bank(&self, id: BankId) -> DomainResult<()> {
        let has_branches = self
            .branches
            .read()
            .map_err(poisoned)?
            .values()
            .any(|b| b.bank_id == id);
        if has_branches {
            return Err(DomainError::validation("bank still has branches"));
        }
        self.banks
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }

    async fn insert_branch(&self, input: NewBranch) -> DomainResult<Branch> {
        if !self.banks.read().map_err(poisoned)?.contains_key(&input.bank_id) {
            return Err(DomainError::NotFound);
        }
        let branch = Branch::register(input)?;
        self.branches
            .write()
            .map_err(poisoned)?
            .insert(branch.id, branch.clone());
        Ok(branch)
    }

    async fn branch(&self, id: BranchId) -> DomainResult<Branch> {
        self.branches
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn branches(&self) -> DomainResult<Vec<Branch>> {
        let mut branches: Vec<Branch> =
            self.branches.read().map_err(poisoned)?.values().cloned().collect();
        branches.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(branches)
    }

    async fn branches_of_bank(&self, bank_id: BankId) -> DomainResult<Vec<Branch>> {
        let mut branches: Vec<Branch> = self
            .branches
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|b| b.bank_id == bank_id)
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(branches)
    }

    async fn update_branch(
        &self,
        id: BranchId,
        name: Option<String>,
        code: Option<String>,
        manager: Option<String>,
    ) -> DomainResult<Branch> {
        let mut branches = self.branches.write().map_err(poisoned)?;
        let branch = branches.get_mut(&id).ok_or(DomainError::NotFound)?;
        branch.update(name, code, manager)?;
        Ok(branch.clone())
    }

    async fn delete_branch(&self, id: BranchId) -> DomainResult<()> {
        let has_accounts = {
            let accounts = self.accounts.read().map_err(poisoned)?;
            let mut found = false;
            for slot in accounts.values() {
                // Cheap peek; falls back to "referenced" when the row is
                // mid-mutation, which only makes the delete more conservative.
                match slot.try_lock() {
                    Ok(account) => {
                        if account.branch_id == id {
                            found = true;
                            break;
                        }
                    }
                    Err(_) => {
                        found = true;
                        break;
                    }
                }
            }
            found
        };
        if has_accounts {
            return Err(DomainError::validation("branch still has accounts"));
        }
        self.branches
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }

    async fn insert_customer(&self, input: NewCustomer) -> DomainResult<Customer> {
        let customer = Customer::register(input)?;
        let mut customers = self.customers.write().map_err(poisoned)?;
        if let Some(email) = &customer.email {
            if customers.values().any(|c| c.email.as_deref() == Some(email)) {
                return Err(DomainError::validation("email already exists"));
            }
        }
        customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn customer(&self, id: CustomerId) -> DomainResult<Customer> {
        self.customers
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn customers(&self) -> DomainResult<Vec<Customer>> {
        let mut customers: Vec<Customer> =
            self.customers.read().map_err(poisoned)?.values().cloned().collect();
        customers.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(customers)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> DomainResult<Customer> {
        let mut customers = self.customers.write().map_err(poisoned)?;
        let customer = customers.get_mut(&id).ok_or(DomainError::NotFound)?;
        customer.update(first_name, last_name, email, phone)?;
        Ok(customer.clone())
    }

    async fn delete_customer(&self, id: CustomerId) -> DomainResult<()> {
        let has_loans = {
            let loans = self.loans.read().map_err(poisoned)?;
            let mut found = false;
            for slot in loans.values() {
                match slot.try_lock() {
                    Ok(loan) => {
                        if loan.customer_id == id {
                            found = true;
                            break;
                        }
                    }
                    Err(_) => {
                        found = true;
                        break;
                    }
                }
            }
            found
        };
        if has_loans {
            return Err(DomainError::validation("customer still has loans"));
        }

        if self.customers.write().map_err(poisoned)?.remove(&id).is_none() {
            return Err(DomainError::NotFound);
        }
        // Holder links cascade with the customer.
        self.links
            .write()
            .map_err(poisoned)?
            .retain(|l| l.customer_id != id);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryBank {
    async fn open_account(&self, input: NewAccount) -> DomainResult<Account> {
        if !self
            .branches
            .read()
            .map_err(poisoned)?
            .contains_key(&input.branch_id)
        {
            return Err(DomainError::NotFound);
        }
        let account = Account::open(input, Utc::now())?;

        let mut numbers = self.account_numbers.write().map_err(poisoned)?;
        if numbers.contains_key(&account.account_number) {
            return Err(DomainError::validation("account_number already exists"));
        }
        numbers.insert(account.account_number.clone(), account.id);
        self.accounts
            .write()
            .map_err(poisoned)?
            .insert(account.id, Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    async fn account(&self, id: AccountId) -> DomainResult<Account> {
        let slot = self.account_slot(id)?;
        let account = slot.lock().await;
        Ok(account.clone())
    }

    async fn accounts(&self) -> DomainResult<Vec<Account>> {
        let slots: Vec<Arc<Mutex<Account>>> = self
            .accounts
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        let mut accounts = Vec::with_capacity(slots.len());
        for slot in slots {
            accounts.push(slot.lock().await.clone());
        }
        accounts.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(accounts)
    }

    async fn accounts_of_customer(&self, customer_id: CustomerId) -> DomainResult<Vec<Account>> {
        let ids: Vec<AccountId> = self
            .links
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|l| l.customer_id == customer_id)
            .map(|l| l.account_id)
            .collect();

        let mut accounts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(slot) = self.account_slot(id) {
                accounts.push(slot.lock().await.clone());
            }
        }
        accounts.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(accounts)
    }

    async fn update_account(
        &self,
        id: AccountId,
        account_number: Option<String>,
        interest_rate: Option<f64>,
    ) -> DomainResult<Account> {
        let slot = self.account_slot(id)?;
        let mut account = slot.lock().await;
        self.account_still_present(id)?;

        // Validate the whole update before touching the number index.
        let mut updated = account.clone();
        updated.update_metadata(account_number, interest_rate)?;

        if updated.account_number != account.account_number {
            let mut numbers = self.account_numbers.write().map_err(poisoned)?;
            if numbers.contains_key(&updated.account_number) {
                return Err(DomainError::validation("account_number already exists"));
            }
            numbers.remove(&account.account_number);
            numbers.insert(updated.account_number.clone(), id);
        }
        *account = updated.clone();
        Ok(updated)
    }

    async fn delete_account(&self, id: AccountId) -> DomainResult<()> {
        let slot = self.account_slot(id)?;
        let account = slot.lock().await;
        self.account_still_present(id)?;

        // Movement history is append-only; an account with history stays.
        let has_movements = self
            .movements
            .read()
            .map_err(poisoned)?
            .iter()
            .any(|m| m.account_id == id);
        if has_movements {
            return Err(DomainError::validation("account has recorded movements"));
        }
        let has_loans = {
            let loans = self.loans.read().map_err(poisoned)?;
            let mut found = false;
            for slot in loans.values() {
                match slot.try_lock() {
                    Ok(loan) => {
                        if loan.account_id == id {
                            found = true;
                            break;
                        }
                    }
                    Err(_) => {
                        found = true;
                        break;
                    }
                }
            }
            found
        };
        if has_loans {
            return Err(DomainError::validation("account still has loans"));
        }

        self.accounts.write().map_err(poisoned)?.remove(&id);
        self.account_numbers
            .write()
            .map_err(poisoned)?
            .remove(&account.account_number);
        self.links.write().map_err(poisoned)?.retain(|l| l.account_id != id);
        Ok(())
    }

    async fn holders(&self, account_id: AccountId) -> DomainResult<Vec<HolderLink>> {
        Ok(self
            .links
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn attach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<HolderLink> {
        if !self
            .customers
            .read()
            .map_err(poisoned)?
            .contains_key(&customer_id)
        {
            return Err(DomainError::NotFound);
        }

        let slot = self.account_slot(account_id)?;
        let mut account = slot.lock().await;
        self.account_still_present(account_id)?;

        let already_linked = self
            .links
            .read()
            .map_err(poisoned)?
            .iter()
            .any(|l| l.account_id == account_id && l.customer_id == customer_id);
        if already_linked {
            return Err(DomainError::AlreadyLinked);
        }

        let count = self.link_count(account_id)?;
        let (role, classification) = attach_outcome(count);
        let link = HolderLink::forge(account_id, customer_id, role, Utc::now());

        self.links.write().map_err(poisoned)?.push(link.clone());
        account.classification = classification;
        Ok(link)
    }

    async fn detach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<()> {
        let slot = self.account_slot(account_id)?;
        let mut account = slot.lock().await;
        self.account_still_present(account_id)?;

        let count_before = {
            let mut links = self.links.write().map_err(poisoned)?;
            let count = links.iter().filter(|l| l.account_id == account_id).count();
            let pos = links
                .iter()
                .position(|l| l.account_id == account_id && l.customer_id == customer_id)
                .ok_or(DomainError::NotFound)?;
            links.remove(pos);
            count
        };

        if let Some(classification) = detach_outcome(count_before) {
            account.classification = classification;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryBank {
    async fn apply_movement(
        &self,
        account_id: AccountId,
        kind: MovementKind,
        amount: Money,
        description: String,
    ) -> DomainResult<Movement> {
        let amount = amount.require_positive()?;

        let slot = self.account_slot(account_id)?;
        let mut account = slot.lock().await;
        self.account_still_present(account_id)?;

        let new_balance = account.balance_after(kind, amount)?;
        let movement = Movement::record(account_id, kind, amount, description, Utc::now());

        // Append, then flip the balance; the assignment cannot fail, so the
        // two writes are never observed apart (the guard is still held).
        self.movements.write().map_err(poisoned)?.push(movement.clone());
        account.balance = new_balance;
        Ok(movement)
    }

    async fn movements_of_account(&self, account_id: AccountId) -> DomainResult<Vec<Movement>> {
        Ok(self
            .movements
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|m| m.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn movements(&self) -> DomainResult<Vec<Movement>> {
        Ok(self.movements.read().map_err(poisoned)?.clone())
    }

    async fn movement(&self, id: MovementId) -> DomainResult<Movement> {
        self.movements
            .read()
            .map_err(poisoned)?
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }
}

#[async_trait]
impl LoanStore for InMemoryBank {
    async fn issue_loan(&self, input: NewLoan) -> DomainResult<Loan> {
        if !self
            .accounts
            .read()
            .map_err(poisoned)?
            .contains_key(&input.account_id)
        {
            return Err(DomainError::NotFound);
        }
        if !self
            .customers
            .read()
            .map_err(poisoned)?
            .contains_key(&input.customer_id)
        {
            return Err(DomainError::NotFound);
        }
        let loan = Loan::issue(input, Utc::now())?;
        self.loans
            .write()
            .map_err(poisoned)?
            .insert(loan.id, Arc::new(Mutex::new(loan.clone())));
        Ok(loan)
    }

    async fn loan(&self, id: LoanId) -> DomainResult<Loan> {
        let slot = self.loan_slot(id)?;
        let loan = slot.lock().await;
        Ok(loan.clone())
    }

    async fn loans(&self) -> DomainResult<Vec<Loan>> {
        let slots: Vec<Arc<Mutex<Loan>>> =
            self.loans.read().map_err(poisoned)?.values().cloned().collect();
        let mut loans = Vec::with_capacity(slots.len());
        for slot in slots {
            loans.push(slot.lock().await.clone());
        }
        loans.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(loans)
    }

    async fn loans_of_customer(&self, customer_id: CustomerId) -> DomainResult<Vec<Loan>> {
        let slots: Vec<Arc<Mutex<Loan>>> =
            self.loans.read().map_err(poisoned)?.values().cloned().collect();
        let mut loans = Vec::new();
        for slot in slots {
            let loan = slot.lock().await;
            if loan.customer_id == customer_id {
                loans.push(loan.clone());
            }
        }
        loans.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(loans)
    }

    async fn update_loan(
        &self,
        id: LoanId,
        interest_rate: Option<f64>,
        term_months: Option<i32>,
    ) -> DomainResult<Loan> {
        let slot = self.loan_slot(id)?;
        let mut loan = slot.lock().await;
        self.loan_still_present(id)?;

        if let Some(rate) = interest_rate {
            if rate < 0.0 {
                return Err(DomainError::validation("interest rate cannot be negative"));
            }
            loan.interest_rate = rate;
        }
        if let Some(term) = term_months {
            if term <= 0 {
                return Err(DomainError::validation("term_months must be greater than zero"));
            }
            loan.term_months = term;
        }
        Ok(loan.clone())
    }

    async fn delete_loan(&self, id: LoanId) -> DomainResult<()> {
        let slot = self.loan_slot(id)?;
        let _loan = slot.lock().await;
        if self.loans.write().map_err(poisoned)?.remove(&id).is_none() {
            return Err(DomainError::NotFound);
        }
        // Repayments cascade with the loan.
        self.repayments
            .write()
            .map_err(poisoned)?
            .retain(|r| r.loan_id != id);
        Ok(())
    }

    async fn settle_repayment(
        &self,
        loan_id: LoanId,
        amount: Money,
        paid_on: DateTime<Utc>,
    ) -> DomainResult<Repayment> {
        let amount = amount.require_positive()?;

        let slot = self.loan_slot(loan_id)?;
        let mut loan = slot.lock().await;
        self.loan_still_present(loan_id)?;

        let repayment = Repayment::record(loan_id, amount, paid_on);
        let total = {
            let mut repayments = self.repayments.write().map_err(poisoned)?;
            repayments.push(repayment.clone());
            repayments
                .iter()
                .filter(|r| r.loan_id == loan_id)
                .map(|r| r.amount)
                .sum::<Money>()
        };

        if loan.settled_by(total) && !loan.is_closed() {
            loan.close();
        }
        Ok(repayment)
    }

    async fn total_repaid(&self, loan_id: LoanId) -> DomainResult<Money> {
        Ok(self
            .repayments
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|r| r.loan_id == loan_id)
            .map(|r| r.amount)
            .sum())
    }

    async fn repayments_of_loan(&self, loan_id: LoanId) -> DomainResult<Vec<Repayment>> {
        Ok(self
            .repayments
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect())
    }

    async fn repayments(&self) -> DomainResult<Vec<Repayment>> {
        Ok(self.repayments.read().map_err(poisoned)?.clone())
    }

    async fn repayment(&self, id: RepaymentId) -> DomainResult<Repayment> {
        self.repayments
            .read()
            .map_err(poisoned)?
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }
}
