use serde::{Deserialize, Serialize};

use corebank_core::{BankId, BranchId, DomainError, DomainResult, Entity};

/// A branch of a bank. Accounts are owned by exactly one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub code: Option<String>,
    pub bank_id: BankId,
    pub manager: Option<String>,
}

/// Input for registering a branch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBranch {
    pub name: String,
    pub code: Option<String>,
    pub bank_id: BankId,
    pub manager: Option<String>,
}

impl Branch {
    pub fn register(input: NewBranch) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("branch name cannot be empty"));
        }

        Ok(Self {
            id: BranchId::new(),
            name: input.name,
            code: input.code,
            bank_id: input.bank_id,
            manager: input.manager,
        })
    }

    pub fn update(&mut self, name: Option<String>, code: Option<String>, manager: Option<String>) -> DomainResult<()> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("branch name cannot be empty"));
            }
            self.name = name;
        }
        if code.is_some() {
            self.code = code;
        }
        if manager.is_some() {
            self.manager = manager;
        }
        Ok(())
    }
}

impl Entity for Branch {
    type Id = BranchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_branch_rejects_empty_name() {
        let err = Branch::register(NewBranch {
            name: String::new(),
            code: None,
            bank_id: BankId::new(),
            manager: None,
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
