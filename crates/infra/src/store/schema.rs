//! Versioned schema bootstrap for the Postgres store.
//!
//! Runs before the API starts serving: applies every migration newer than
//! the recorded schema version, each inside its own transaction. The core
//! never touches schema state.

use sqlx::PgPool;
use tracing::info;

use corebank_core::{DomainError, DomainResult};

struct Migration {
    version: i32,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[
        r#"
        CREATE TABLE banks (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            code TEXT UNIQUE,
            location TEXT
        )
        "#,
        r#"
        CREATE TABLE branches (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT UNIQUE,
            bank_id UUID NOT NULL REFERENCES banks(id) ON DELETE RESTRICT,
            manager TEXT
        )
        "#,
        "CREATE INDEX idx_branches_bank ON branches(bank_id)",
        r#"
        CREATE TABLE customers (
            id UUID PRIMARY KEY,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT UNIQUE,
            phone TEXT UNIQUE
        )
        "#,
        r#"
        CREATE TABLE accounts (
            id UUID PRIMARY KEY,
            account_number TEXT NOT NULL UNIQUE,
            branch_id UUID NOT NULL REFERENCES branches(id) ON DELETE RESTRICT,
            classification TEXT NOT NULL DEFAULT 'savings'
                CHECK (classification IN ('savings', 'joint')),
            interest_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
            balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        "CREATE INDEX idx_accounts_branch ON accounts(branch_id)",
        r#"
        CREATE TABLE account_holders (
            id UUID PRIMARY KEY,
            account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            customer_id UUID NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            role TEXT NOT NULL DEFAULT 'primary_holder'
                CHECK (role IN ('primary_holder', 'joint_holder')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (account_id, customer_id)
        )
        "#,
        r#"
        CREATE TABLE movements (
            seq BIGSERIAL PRIMARY KEY,
            id UUID NOT NULL UNIQUE,
            account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
            kind TEXT NOT NULL CHECK (kind IN ('deposit', 'withdrawal', 'transfer')),
            amount BIGINT NOT NULL CHECK (amount > 0),
            description TEXT NOT NULL DEFAULT '',
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        "CREATE INDEX idx_movements_account ON movements(account_id)",
        r#"
        CREATE TABLE loans (
            id UUID PRIMARY KEY,
            account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
            customer_id UUID NOT NULL REFERENCES customers(id) ON DELETE RESTRICT,
            principal BIGINT NOT NULL CHECK (principal > 0),
            interest_rate DOUBLE PRECISION NOT NULL,
            start_date TIMESTAMPTZ NOT NULL,
            term_months INT NOT NULL CHECK (term_months > 0),
            status TEXT NOT NULL DEFAULT 'ongoing' CHECK (status IN ('ongoing', 'closed'))
        )
        "#,
        "CREATE INDEX idx_loans_customer ON loans(customer_id)",
        r#"
        CREATE TABLE repayments (
            id UUID PRIMARY KEY,
            loan_id UUID NOT NULL REFERENCES loans(id) ON DELETE CASCADE,
            amount BIGINT NOT NULL CHECK (amount > 0),
            paid_on TIMESTAMPTZ NOT NULL
        )
        "#,
        "CREATE INDEX idx_repayments_loan ON repayments(loan_id)",
    ],
}];

/// Bring the database schema up to the current version.
pub async fn bootstrap(pool: &PgPool) -> DomainResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DomainError::storage(format!("failed to create schema_version: {e}")))?;

    let row: (i32,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(|e| DomainError::storage(format!("failed to read schema version: {e}")))?;
    let current = row.0;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("failed to begin migration: {e}")))?;

        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *tx).await.map_err(|e| {
                DomainError::storage(format!(
                    "migration {} failed: {e}",
                    migration.version
                ))
            })?;
        }

        sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "failed to record migration {}: {e}",
                    migration.version
                ))
            })?;

        tx.commit().await.map_err(|e| {
            DomainError::storage(format!(
                "failed to commit migration {}: {e}",
                migration.version
            ))
        })?;

        info!(version = migration.version, "applied schema migration");
    }

    Ok(())
}
