//! `corebank-api` — HTTP layer over the ledger and settlement engines.

pub mod app;
