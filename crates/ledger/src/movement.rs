use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use corebank_core::{AccountId, DomainError, Entity, Money, MovementId};

/// Kind of a ledger movement.
///
/// `Transfer` is a paired single-account debit (it behaves like a
/// withdrawal on this side); there is no double-entry counterpart here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl MovementKind {
    /// Whether this kind debits the account (requires sufficient balance).
    pub fn is_debit(&self) -> bool {
        matches!(self, MovementKind::Withdrawal | MovementKind::Transfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Deposit => "deposit",
            MovementKind::Withdrawal => "withdrawal",
            MovementKind::Transfer => "transfer",
        }
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(MovementKind::Deposit),
            "withdrawal" => Ok(MovementKind::Withdrawal),
            "transfer" => Ok(MovementKind::Transfer),
            other => Err(DomainError::invalid_kind(other)),
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded balance-affecting event on an account.
///
/// Immutable once created; the ledger is append-only and movements are never
/// updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub account_id: AccountId,
    pub kind: MovementKind,
    pub amount: Money,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl Movement {
    /// Build the record for a movement that has just been applied.
    pub fn record(
        account_id: AccountId,
        kind: MovementKind,
        amount: Money,
        description: String,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            account_id,
            kind,
            amount,
            description,
            recorded_at,
        }
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
