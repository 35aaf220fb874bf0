use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corebank_core::{AccountId, BranchId, DomainError, DomainResult, Entity, Money};

use crate::movement::MovementKind;

/// Account classification, driven by holder-link cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountClassification {
    Savings,
    Joint,
}

impl AccountClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountClassification::Savings => "savings",
            AccountClassification::Joint => "joint",
        }
    }
}

/// A customer account.
///
/// The balance is mutated only through the movement engine; classification is
/// mutated only through the relationship manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub branch_id: BranchId,
    pub classification: AccountClassification,
    pub interest_rate: f64,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

/// Input for opening an account.
///
/// Accounts always open with a zero balance; funds arrive through movements.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAccount {
    pub account_number: String,
    pub branch_id: BranchId,
    pub interest_rate: Option<f64>,
}

impl Account {
    pub fn open(input: NewAccount, opened_at: DateTime<Utc>) -> DomainResult<Self> {
        if input.account_number.trim().is_empty() {
            return Err(DomainError::validation("account_number cannot be empty"));
        }
        let interest_rate = input.interest_rate.unwrap_or(0.0);
        if interest_rate < 0.0 {
            return Err(DomainError::validation("interest rate cannot be negative"));
        }

        Ok(Self {
            id: AccountId::new(),
            account_number: input.account_number,
            branch_id: input.branch_id,
            classification: AccountClassification::Savings,
            interest_rate,
            balance: Money::ZERO,
            created_at: opened_at,
        })
    }

    /// Balance after applying a movement, or the reason it must be refused.
    ///
    /// Debits require `balance >= amount`; on failure nothing may be written.
    /// The caller must hold exclusive access to this account for the whole
    /// read-validate-write cycle.
    pub fn balance_after(&self, kind: MovementKind, amount: Money) -> DomainResult<Money> {
        let amount = amount.require_positive()?;
        if kind.is_debit() {
            if self.balance < amount {
                return Err(DomainError::InsufficientFunds);
            }
            self.balance.checked_sub(amount)
        } else {
            self.balance.checked_add(amount)
        }
    }

    /// Metadata update; balance and classification are not touchable here.
    pub fn update_metadata(
        &mut self,
        account_number: Option<String>,
        interest_rate: Option<f64>,
    ) -> DomainResult<()> {
        if let Some(number) = account_number {
            if number.trim().is_empty() {
                return Err(DomainError::validation("account_number cannot be empty"));
            }
            self.account_number = number;
        }
        if let Some(rate) = interest_rate {
            if rate < 0.0 {
                return Err(DomainError::validation("interest rate cannot be negative"));
            }
            self.interest_rate = rate;
        }
        Ok(())
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
