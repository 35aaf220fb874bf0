//! `corebank-ledger` — account and movement domain model.
//!
//! Pure, deterministic decision logic: what a movement does to a balance,
//! when it must be refused, and how holder-link cardinality drives account
//! classification. Storage and locking live in `corebank-infra`; both store
//! backends funnel through the rules here so each invariant exists exactly
//! once.

pub mod account;
pub mod holder;
pub mod movement;

pub use account::{Account, AccountClassification, NewAccount};
pub use holder::{attach_outcome, detach_outcome, HolderLink, HolderRole};
pub use movement::{Movement, MovementKind};
