//! # Integration Flows
//!
//! Shared fixtures for the flow tests.

pub mod composite_flows;
pub mod propagation_flows;

use std::sync::{Arc, OnceLock};
use tx_backends::{KvClientProvider, KvStore, SqlClientProvider, SqlDatabase};
use tx_core::{
    BackendTransactor, ConnectionProvider, DefaultConnectionProvider, TxIdentity,
};
use tx_telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};

static TELEMETRY: OnceLock<Option<TelemetryGuard>> = OnceLock::new();

/// Install logging and metrics once per test process.
pub fn init_test_telemetry() {
    TELEMETRY.get_or_init(|| {
        let config = TelemetryConfig::default()
            .with_service_name("tx-tests")
            .with_log_level("debug");
        init_telemetry(config).ok()
    });
}

/// Single relational database with its transactor and client provider.
pub struct SqlFixture {
    /// Database
    pub db: Arc<SqlDatabase>,
    /// Transactor bound under `rdbms`
    pub transactor: Arc<BackendTransactor<SqlDatabase>>,
    /// Client provider for the same identity
    pub clients: Arc<SqlClientProvider>,
}

impl SqlFixture {
    /// Fixture over a fresh database.
    pub fn new() -> Self {
        Self::with_database(SqlDatabase::new("rdbms"))
    }

    /// Fixture over `db`.
    pub fn with_database(db: SqlDatabase) -> Self {
        let db = Arc::new(db);
        let connections: Arc<dyn ConnectionProvider<SqlDatabase>> =
            Arc::new(DefaultConnectionProvider::new(Arc::clone(&db)));
        Self {
            db,
            transactor: Arc::new(BackendTransactor::new(
                TxIdentity::fixed("rdbms"),
                Arc::clone(&connections),
            )),
            clients: Arc::new(SqlClientProvider::new(TxIdentity::fixed("rdbms"), connections)),
        }
    }
}

/// Single key-value store with its transactor and client provider.
pub struct KvFixture {
    /// Store
    pub store: Arc<KvStore>,
    /// Transactor bound under `kv`
    pub transactor: Arc<BackendTransactor<KvStore>>,
    /// Client provider for the same identity
    pub clients: Arc<KvClientProvider>,
}

impl KvFixture {
    /// Fixture over a fresh store.
    pub fn new() -> Self {
        let store = Arc::new(KvStore::new("kv"));
        let connections: Arc<dyn ConnectionProvider<KvStore>> =
            Arc::new(DefaultConnectionProvider::new(Arc::clone(&store)));
        Self {
            store,
            transactor: Arc::new(BackendTransactor::new(
                TxIdentity::fixed("kv"),
                Arc::clone(&connections),
            )),
            clients: Arc::new(KvClientProvider::new(TxIdentity::fixed("kv"), connections)),
        }
    }
}
