use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use corebank_core::{AccountId, CustomerId, DomainResult, LoanId, Money};
use corebank_engine::{AccountDetail, MovementEngine, RelationshipManager, SettlementEngine};
use corebank_infra::store::schema;
use corebank_infra::{AccountStore, InMemoryBank, LedgerStore, LoanStore, PgBank, RegistryStore};
use corebank_ledger::{Movement, MovementKind};
use corebank_lending::{LoanDetails, Repayment};

/// Engine and store wiring for one backend.
///
/// The in-memory backend is the default (dev/test); set
/// `USE_PERSISTENT_STORES=true` and `DATABASE_URL` to run against Postgres.
pub enum AppServices {
    InMemory {
        store: Arc<InMemoryBank>,
        movements: MovementEngine<InMemoryBank>,
        settlements: SettlementEngine<InMemoryBank>,
        relationships: RelationshipManager<InMemoryBank>,
    },
    Persistent {
        store: Arc<PgBank>,
        movements: MovementEngine<PgBank>,
        settlements: SettlementEngine<PgBank>,
        relationships: RelationshipManager<PgBank>,
    },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services().await
    } else {
        build_in_memory_services()
    }
}

pub fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryBank::new());
    AppServices::InMemory {
        movements: MovementEngine::new(store.clone()),
        settlements: SettlementEngine::new(store.clone()),
        relationships: RelationshipManager::new(store.clone()),
        store,
    }
}

async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    schema::bootstrap(&pool)
        .await
        .expect("failed to bootstrap database schema");

    let store = Arc::new(PgBank::new(pool));
    AppServices::Persistent {
        movements: MovementEngine::new(store.clone()),
        settlements: SettlementEngine::new(store.clone()),
        relationships: RelationshipManager::new(store.clone()),
        store,
    }
}

impl AppServices {
    /// Bank / branch / customer record store.
    pub fn registry(&self) -> &dyn RegistryStore {
        match self {
            AppServices::InMemory { store, .. } => store.as_ref(),
            AppServices::Persistent { store, .. } => store.as_ref(),
        }
    }

    /// Account + holder-link record store.
    pub fn accounts(&self) -> &dyn AccountStore {
        match self {
            AppServices::InMemory { store, .. } => store.as_ref(),
            AppServices::Persistent { store, .. } => store.as_ref(),
        }
    }

    /// Movement ledger (read paths; mutations go through the engine).
    pub fn ledger(&self) -> &dyn LedgerStore {
        match self {
            AppServices::InMemory { store, .. } => store.as_ref(),
            AppServices::Persistent { store, .. } => store.as_ref(),
        }
    }

    /// Loan + repayment record store (read paths; settlement goes through
    /// the engine).
    pub fn loans(&self) -> &dyn LoanStore {
        match self {
            AppServices::InMemory { store, .. } => store.as_ref(),
            AppServices::Persistent { store, .. } => store.as_ref(),
        }
    }

    pub async fn apply_movement(
        &self,
        account_id: AccountId,
        kind: MovementKind,
        amount: Money,
        description: String,
    ) -> DomainResult<Movement> {
        match self {
            AppServices::InMemory { movements, .. } => {
                movements.apply(account_id, kind, amount, description).await
            }
            AppServices::Persistent { movements, .. } => {
                movements.apply(account_id, kind, amount, description).await
            }
        }
    }

    pub async fn movement_history(&self, account_id: AccountId) -> DomainResult<Vec<Movement>> {
        match self {
            AppServices::InMemory { movements, .. } => movements.history(account_id).await,
            AppServices::Persistent { movements, .. } => movements.history(account_id).await,
        }
    }

    pub async fn repay_loan(
        &self,
        loan_id: LoanId,
        amount: Money,
        paid_on: DateTime<Utc>,
    ) -> DomainResult<Repayment> {
        match self {
            AppServices::InMemory { settlements, .. } => {
                settlements.repay(loan_id, amount, paid_on).await
            }
            AppServices::Persistent { settlements, .. } => {
                settlements.repay(loan_id, amount, paid_on).await
            }
        }
    }

    pub async fn loan_details(&self, loan_id: LoanId) -> DomainResult<LoanDetails> {
        match self {
            AppServices::InMemory { settlements, .. } => settlements.details(loan_id).await,
            AppServices::Persistent { settlements, .. } => settlements.details(loan_id).await,
        }
    }

    pub async fn attach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<AccountDetail> {
        match self {
            AppServices::InMemory { relationships, .. } => {
                relationships.attach(account_id, customer_id).await
            }
            AppServices::Persistent { relationships, .. } => {
                relationships.attach(account_id, customer_id).await
            }
        }
    }

    pub async fn detach_holder(
        &self,
        account_id: AccountId,
        customer_id: CustomerId,
    ) -> DomainResult<()> {
        match self {
            AppServices::InMemory { relationships, .. } => {
                relationships.detach(account_id, customer_id).await
            }
            AppServices::Persistent { relationships, .. } => {
                relationships.detach(account_id, customer_id).await
            }
        }
    }

    pub async fn account_detail(&self, account_id: AccountId) -> DomainResult<AccountDetail> {
        match self {
            AppServices::InMemory { relationships, .. } => {
                relationships.account_detail(account_id).await
            }
            AppServices::Persistent { relationships, .. } => {
                relationships.account_detail(account_id).await
            }
        }
    }
}
