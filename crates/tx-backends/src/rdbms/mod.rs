//! # Relational Backend
//!
//! In-memory database of named tables. A transaction stages its writes and
//! applies them in one step at commit; reads inside the transaction see the
//! committed rows with the staged writes laid over them.

mod client;

pub use client::{SqlClient, SqlClientProvider};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use tx_core::{BackendError, TxBackend, TxConfig};
use uuid::Uuid;

/// One table row.
pub type Row = Value;

type Tables = HashMap<String, Vec<Row>>;

/// Write staged by a transaction.
#[derive(Clone, Debug, PartialEq)]
enum SqlWrite {
    Insert { table: String, row: Row },
    DeleteAll { table: String },
}

impl SqlWrite {
    fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::DeleteAll { table } => table,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Insert { table, .. } => format!("insert into {table}"),
            Self::DeleteAll { table } => format!("delete from {table}"),
        }
    }

    fn apply_to(&self, rows: &mut Vec<Row>) {
        match self {
            Self::Insert { row, .. } => rows.push(row.clone()),
            Self::DeleteAll { .. } => rows.clear(),
        }
    }
}

#[derive(Default)]
struct Staged {
    writes: Vec<SqlWrite>,
    finished: bool,
}

/// Handle of an open relational transaction.
pub struct SqlTransaction {
    id: Uuid,
    read_only: bool,
    staged: Mutex<Staged>,
}

impl SqlTransaction {
    fn new(read_only: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            read_only,
            staged: Mutex::new(Staged::default()),
        }
    }

    /// Transaction identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of staged writes.
    pub fn pending_writes(&self) -> usize {
        self.staged.lock().writes.len()
    }

    fn stage(&self, write: SqlWrite) -> Result<(), BackendError> {
        if self.read_only {
            return Err(BackendError::ReadOnlyViolation(write.describe()));
        }
        let mut staged = self.staged.lock();
        if staged.finished {
            return Err(BackendError::TransactionFinished(self.id.to_string()));
        }
        staged.writes.push(write);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.staged.lock().finished {
            Err(BackendError::TransactionFinished(self.id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Mark finished and hand back the staged writes.
    fn finish(&self) -> Result<Vec<SqlWrite>, BackendError> {
        let mut staged = self.staged.lock();
        if staged.finished {
            return Err(BackendError::TransactionFinished(self.id.to_string()));
        }
        staged.finished = true;
        Ok(std::mem::take(&mut staged.writes))
    }
}

impl fmt::Debug for SqlTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTransaction")
            .field("id", &self.id)
            .field("read_only", &self.read_only)
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}

/// In-memory relational database.
pub struct SqlDatabase {
    name: String,
    tables: RwLock<Tables>,
    open: Mutex<usize>,
    max_open: Option<usize>,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
}

impl SqlDatabase {
    /// Empty database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
            open: Mutex::new(0),
            max_open: None,
            fail_begin: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
        }
    }

    /// Limit the number of concurrently open transactions.
    pub fn with_max_open_transactions(mut self, max: usize) -> Self {
        self.max_open = Some(max);
        self
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transactions currently open.
    pub fn open_transactions(&self) -> usize {
        *self.open.lock()
    }

    /// Fail the next `begin`.
    pub fn fail_next_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    /// Fail the next `commit`.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    // =========================================================================
    // Autocommit operations
    // =========================================================================

    /// Insert a row, committed immediately.
    pub fn insert(&self, table: &str, row: Row) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Committed rows of `table`.
    pub fn select_all(&self, table: &str) -> Vec<Row> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Number of committed rows in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    /// Delete every row of `table`, returning how many were removed.
    pub fn delete_all(&self, table: &str) -> usize {
        self.tables
            .write()
            .get_mut(table)
            .map_or(0, |rows| std::mem::take(rows).len())
    }

    // =========================================================================
    // Transactional view
    // =========================================================================

    fn select_in(&self, tx: &SqlTransaction, table: &str) -> Result<Vec<Row>, BackendError> {
        tx.ensure_open()?;
        let mut rows = self.select_all(table);
        let staged = tx.staged.lock();
        staged
            .writes
            .iter()
            .filter(|w| w.table() == table)
            .for_each(|w| w.apply_to(&mut rows));
        Ok(rows)
    }

    fn release_slot(&self) {
        let mut open = self.open.lock();
        *open = open.saturating_sub(1);
    }
}

#[async_trait]
impl TxBackend for SqlDatabase {
    type Handle = SqlTransaction;

    fn kind(&self) -> &'static str {
        "rdbms"
    }

    async fn begin(&self, config: &TxConfig) -> Result<SqlTransaction, BackendError> {
        if self.fail_begin.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Injected(format!("begin on {}", self.name)));
        }
        {
            let mut open = self.open.lock();
            if let Some(max) = self.max_open {
                if *open >= max {
                    return Err(BackendError::Exhausted { open: *open, max });
                }
            }
            *open += 1;
        }
        let tx = SqlTransaction::new(config.read_only);
        debug!(
            database = %self.name,
            tx = %tx.id,
            read_only = tx.read_only,
            "[tx-backends] rdbms transaction opened"
        );
        Ok(tx)
    }

    async fn commit(&self, tx: &SqlTransaction) -> Result<(), BackendError> {
        let writes = tx.finish()?;
        self.release_slot();
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Injected(format!("commit on {}", self.name)));
        }

        let mut tables = self.tables.write();
        for write in &writes {
            write.apply_to(tables.entry(write.table().to_string()).or_default());
        }
        debug!(
            database = %self.name,
            tx = %tx.id,
            writes = writes.len(),
            "[tx-backends] rdbms transaction committed"
        );
        Ok(())
    }

    async fn rollback(&self, tx: &SqlTransaction) -> Result<(), BackendError> {
        let discarded = tx.finish()?;
        self.release_slot();
        debug!(
            database = %self.name,
            tx = %tx.id,
            discarded = discarded.len(),
            "[tx-backends] rdbms transaction rolled back"
        );
        Ok(())
    }
}

impl fmt::Debug for SqlDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlDatabase")
            .field("name", &self.name)
            .field("open_transactions", &self.open_transactions())
            .finish()
    }
}
