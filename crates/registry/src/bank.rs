use serde::{Deserialize, Serialize};

use corebank_core::{BankId, DomainError, DomainResult, Entity};

/// A bank: the top of the branch/account hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
    pub code: Option<String>,
    pub location: Option<String>,
}

/// Input for registering a bank.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBank {
    pub name: String,
    pub code: Option<String>,
    pub location: Option<String>,
}

impl Bank {
    pub fn register(input: NewBank) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("bank name cannot be empty"));
        }

        Ok(Self {
            id: BankId::new(),
            name: input.name,
            code: input.code,
            location: input.location,
        })
    }

    /// Apply an update; `None` fields keep their current value.
    pub fn update(&mut self, name: Option<String>, code: Option<String>, location: Option<String>) -> DomainResult<()> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("bank name cannot be empty"));
            }
            self.name = name;
        }
        if code.is_some() {
            self.code = code;
        }
        if location.is_some() {
            self.location = location;
        }
        Ok(())
    }
}

impl Entity for Bank {
    type Id = BankId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
