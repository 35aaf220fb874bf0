use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corebank_core::{Entity, LoanId, Money, RepaymentId};

/// One recorded repayment against a loan.
///
/// Immutable once created; repayment history is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub paid_on: DateTime<Utc>,
}

impl Repayment {
    pub fn record(loan_id: LoanId, amount: Money, paid_on: DateTime<Utc>) -> Self {
        Self {
            id: RepaymentId::new(),
            loan_id,
            amount,
            paid_on,
        }
    }
}

impl Entity for Repayment {
    type Id = RepaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
