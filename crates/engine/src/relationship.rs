use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use corebank_core::{AccountId, CustomerId, DomainResult};
use corebank_infra::{AccountStore, RegistryStore};
use corebank_ledger::{Account, HolderRole};
use corebank_registry::Customer;

/// One linked customer on an account detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderSummary {
    pub customer: Customer,
    pub role: HolderRole,
}

/// Account fields plus all linked customers with their roles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDetail {
    pub account: Account,
    pub holders: Vec<HolderSummary>,
}

/// Maintains the account-holder linkage and the derived classification.
#[derive(Debug)]
pub struct RelationshipManager<S> {
    store: Arc<S>,
}

impl<S> Clone for RelationshipManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: AccountStore + RegistryStore> RelationshipManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Link a customer to an account.
    ///
    /// Fails `NotFound` when either side is missing and `AlreadyLinked` on a
    /// duplicate pair. The first holder becomes the primary; any further
    /// holder is a joint holder and the account classification becomes
    /// `joint`. Returns the refreshed account detail.
    #[instrument(skip(self), fields(account_id = %account_id, customer_id = %customer_id), err)]
    pub async fn attach(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<AccountDetail> {
        // Customer existence is checked here; the store re-checks the account
        // under its guard.
        self.store.customer(customer_id).await?;
        let link = self.store.attach_holder(account_id, customer_id).await?;
        tracing::debug!(link_id = %link.id, role = link.role.as_str(), "holder attached");
        self.account_detail(account_id).await
    }

    /// Unlink a customer from an account.
    ///
    /// Fails `NotFound` when the link is absent, leaving classification
    /// untouched. When the link count immediately before removal was exactly
    /// two, classification reverts to `savings`.
    #[instrument(skip(self), fields(account_id = %account_id, customer_id = %customer_id), err)]
    pub async fn detach(&self, account_id: AccountId, customer_id: CustomerId) -> DomainResult<()> {
        self.store.detach_holder(account_id, customer_id).await
    }

    /// Account fields plus linked customers with roles. Never mutates state.
    pub async fn account_detail(&self, account_id: AccountId) -> DomainResult<AccountDetail> {
        let account = self.store.account(account_id).await?;
        let links = self.store.holders(account_id).await?;

        let mut holders = Vec::with_capacity(links.len());
        for link in links {
            let customer = self.store.customer(link.customer_id).await?;
            holders.push(HolderSummary {
                customer,
                role: link.role,
            });
        }

        Ok(AccountDetail { account, holders })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebank_core::DomainError;
    use corebank_infra::InMemoryBank;
    use corebank_ledger::{AccountClassification, NewAccount};
    use corebank_registry::{NewBank, NewBranch, NewCustomer};

    struct Fixture {
        manager: RelationshipManager<InMemoryBank>,
        account_id: AccountId,
        ada: CustomerId,
        grace: CustomerId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryBank::new());
        let bank = store
            .insert_bank(NewBank {
                name: "Holder Bank".to_string(),
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
                account_number: "HB-0001".to_string(),
                branch_id: branch.id,
                interest_rate: None,
            })
            .await
            .unwrap();
        let ada = store
            .insert_customer(NewCustomer {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: None,
                phone: None,
            })
            .await
            .unwrap();
        let grace = store
            .insert_customer(NewCustomer {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: None,
                phone: None,
            })
            .await
            .unwrap();

        Fixture {
            manager: RelationshipManager::new(store),
            account_id: account.id,
            ada: ada.id,
            grace: grace.id,
        }
    }

    #[tokio::test]
    async fn first_attach_yields_primary_holder_on_savings() {
        let fx = fixture().await;
        let detail = fx.manager.attach(fx.account_id, fx.ada).await.unwrap();

        assert_eq!(detail.account.classification, AccountClassification::Savings);
        assert_eq!(detail.holders.len(), 1);
        assert_eq!(detail.holders[0].role, HolderRole::PrimaryHolder);
        assert_eq!(detail.holders[0].customer.first_name, "Ada");
    }

    #[tokio::test]
    async fn second_attach_makes_the_account_joint() {
        let fx = fixture().await;
        fx.manager.attach(fx.account_id, fx.ada).await.unwrap();
        let detail = fx.manager.attach(fx.account_id, fx.grace).await.unwrap();

        assert_eq!(detail.account.classification, AccountClassification::Joint);
        let roles: Vec<HolderRole> = detail.holders.iter().map(|h| h.role).collect();
        assert!(roles.contains(&HolderRole::PrimaryHolder));
        assert!(roles.contains(&HolderRole::JointHolder));
    }

    #[tokio::test]
    async fn attach_detach_attach_walks_the_classification_state_machine() {
        let fx = fixture().await;

        fx.manager.attach(fx.account_id, fx.ada).await.unwrap();
        let joint = fx.manager.attach(fx.account_id, fx.grace).await.unwrap();
        assert_eq!(joint.account.classification, AccountClassification::Joint);

        fx.manager.detach(fx.account_id, fx.grace).await.unwrap();
        let detail = fx.manager.account_detail(fx.account_id).await.unwrap();
        assert_eq!(detail.account.classification, AccountClassification::Savings);
        assert_eq!(detail.holders.len(), 1);

        let rejoined = fx.manager.attach(fx.account_id, fx.grace).await.unwrap();
        assert_eq!(rejoined.account.classification, AccountClassification::Joint);
    }

    #[tokio::test]
    async fn attach_rejects_duplicates_and_missing_records() {
        let fx = fixture().await;

        fx.manager.attach(fx.account_id, fx.ada).await.unwrap();
        assert_eq!(
            fx.manager.attach(fx.account_id, fx.ada).await.unwrap_err(),
            DomainError::AlreadyLinked
        );
        assert_eq!(
            fx.manager
                .attach(fx.account_id, CustomerId::new())
                .await
                .unwrap_err(),
            DomainError::NotFound
        );
        assert_eq!(
            fx.manager.attach(AccountId::new(), fx.ada).await.unwrap_err(),
            DomainError::NotFound
        );
    }

    #[tokio::test]
    async fn detach_of_absent_link_is_not_found() {
        let fx = fixture().await;
        fx.manager.attach(fx.account_id, fx.ada).await.unwrap();

        assert_eq!(
            fx.manager
                .detach(fx.account_id, fx.grace)
                .await
                .unwrap_err(),
            DomainError::NotFound
        );
        // Still exactly one holder, classification untouched.
        let detail = fx.manager.account_detail(fx.account_id).await.unwrap();
        assert_eq!(detail.holders.len(), 1);
        assert_eq!(detail.account.classification, AccountClassification::Savings);
    }
}
