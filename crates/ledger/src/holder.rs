use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corebank_core::{AccountId, CustomerId, Entity, HolderLinkId};

use crate::account::AccountClassification;

/// Role of a customer on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderRole {
    PrimaryHolder,
    JointHolder,
}

impl HolderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolderRole::PrimaryHolder => "primary_holder",
            HolderRole::JointHolder => "joint_holder",
        }
    }
}

/// The account-customer linkage row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderLink {
    pub id: HolderLinkId,
    pub account_id: AccountId,
    pub customer_id: CustomerId,
    pub role: HolderRole,
    pub created_at: DateTime<Utc>,
}

impl HolderLink {
    pub fn forge(
        account_id: AccountId,
        customer_id: CustomerId,
        role: HolderRole,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HolderLinkId::new(),
            account_id,
            customer_id,
            role,
            created_at,
        }
    }
}

impl Entity for HolderLink {
    type Id = HolderLinkId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Role for a new holder and the resulting classification, given how many
/// links the account already has.
///
/// First holder is the primary; every further holder is a joint holder and
/// flips the account to `joint`.
pub fn attach_outcome(existing_links: usize) -> (HolderRole, AccountClassification) {
    if existing_links == 0 {
        (HolderRole::PrimaryHolder, AccountClassification::Savings)
    } else {
        (HolderRole::JointHolder, AccountClassification::Joint)
    }
}

/// Classification change on holder removal, given the link count immediately
/// before the removal. `None` means classification is untouched.
///
/// Only the 2→1 transition reverts to `savings`; removing one of three or
/// more holders leaves the account `joint`, which coincides with
/// "joint iff at least two holders remain" for every state reachable through
/// attach/detach.
pub fn detach_outcome(links_before_removal: usize) -> Option<AccountClassification> {
    if links_before_removal == 2 {
        Some(AccountClassification::Savings)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_holder_is_primary_on_a_savings_account() {
        let (role, classification) = attach_outcome(0);
        assert_eq!(role, HolderRole::PrimaryHolder);
        assert_eq!(classification, AccountClassification::Savings);
    }

    #[test]
    fn second_and_later_holders_are_joint() {
        for existing in 1..5 {
            let (role, classification) = attach_outcome(existing);
            assert_eq!(role, HolderRole::JointHolder);
            assert_eq!(classification, AccountClassification::Joint);
        }
    }

    #[test]
    fn only_the_two_to_one_transition_reverts_classification() {
        assert_eq!(detach_outcome(2), Some(AccountClassification::Savings));
        assert_eq!(detach_outcome(1), None);
        assert_eq!(detach_outcome(3), None);
        assert_eq!(detach_outcome(4), None);
    }

    /// Walk attach/detach sequences and check that classification is joint
    /// exactly when at least two holders remain.
    #[test]
    fn classification_tracks_link_cardinality_across_transitions() {
        let mut links: usize = 0;
        let mut classification = AccountClassification::Savings;

        let mut attach = |links: &mut usize, classification: &mut AccountClassification| {
            let (_, next) = attach_outcome(*links);
            *links += 1;
            *classification = next;
        };
        let mut detach = |links: &mut usize, classification: &mut AccountClassification| {
            if let Some(next) = detach_outcome(*links) {
                *classification = next;
            }
            *links -= 1;
        };

        // savings -> joint -> savings -> joint (spec sequence 1 -> 2 -> 1 -> 2)
        attach(&mut links, &mut classification);
        assert_eq!(classification, AccountClassification::Savings);
        attach(&mut links, &mut classification);
        assert_eq!(classification, AccountClassification::Joint);
        detach(&mut links, &mut classification);
        assert_eq!(classification, AccountClassification::Savings);
        attach(&mut links, &mut classification);
        assert_eq!(classification, AccountClassification::Joint);

        // Growing to three holders and back keeps joint until 2 -> 1.
        attach(&mut links, &mut classification);
        assert_eq!(links, 3);
        assert_eq!(classification, AccountClassification::Joint);
        detach(&mut links, &mut classification);
        assert_eq!(classification, AccountClassification::Joint);
        detach(&mut links, &mut classification);
        assert_eq!(links, 1);
        assert_eq!(classification, AccountClassification::Savings);
    }
}
