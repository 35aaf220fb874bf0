//! Infrastructure layer: record stores, the balance guard, schema bootstrap.

pub mod store;

pub use store::{
    AccountStore, InMemoryBank, LedgerStore, LoanStore, PgBank, RegistryStore,
};

#[cfg(test)]
mod integration_tests;
