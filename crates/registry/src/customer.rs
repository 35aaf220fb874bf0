use serde::{Deserialize, Serialize};

use corebank_core::{CustomerId, DomainError, DomainResult, Entity};

/// A customer. Linked to accounts through holder links and to loans directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input for registering a customer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Customer {
    pub fn register(input: NewCustomer) -> DomainResult<Self> {
        if input.first_name.trim().is_empty() && input.last_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }

        Ok(Self {
            id: CustomerId::new(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
        })
    }

    pub fn update(
        &mut self,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> DomainResult<()> {
        if let Some(first_name) = first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            self.last_name = last_name;
        }
        if email.is_some() {
            self.email = email;
        }
        if phone.is_some() {
            self.phone = phone;
        }
        if self.first_name.trim().is_empty() && self.last_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_customer(first: &str, last: &str) -> NewCustomer {
        NewCustomer {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: None,
            phone: None,
        }
    }

    #[test]
    fn register_requires_some_name() {
        assert!(Customer::register(new_customer("", "")).is_err());
        assert!(Customer::register(new_customer("Ada", "")).is_ok());
    }

    #[test]
    fn update_cannot_blank_out_both_names() {
        let mut customer = Customer::register(new_customer("Ada", "Lovelace")).unwrap();
        let err = customer
            .update(Some(String::new()), Some(String::new()), None, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
