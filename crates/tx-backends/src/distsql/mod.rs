//! # Distributed SQL Backend
//!
//! In-memory multi-version database with a logical commit clock.
//!
//! ## Transactions
//!
//! | Option | Handle | Reads | Writes |
//! |--------|--------|-------|--------|
//! | default | read-write | snapshot at begin + own DML | buffered, applied at commit |
//! | `read_only` | read-only | snapshot chosen by [`StaleRead`] | rejected |
//!
//! A read-write commit fails with `Conflict` when another commit wrote one of
//! its keys after its snapshot.

mod client;
mod types;

pub use client::{DistClient, DistClientProvider};
pub use types::{Mutation, Row, StaleRead, Statement, Timestamp, TimestampBound};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use tx_core::{BackendError, TxBackend, TxConfig};
use uuid::Uuid;

/// Kind of an open transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxMode {
    /// Buffers writes until commit.
    ReadWrite,
    /// Reads one snapshot, rejects writes.
    ReadOnly,
}

#[derive(Clone, Debug)]
struct Version {
    ts: Timestamp,
    row: Option<Row>,
}

type CellKey = (String, String);

#[derive(Default)]
struct Versions {
    clock: Timestamp,
    cells: BTreeMap<CellKey, Vec<Version>>,
}

impl Versions {
    fn read_at(&self, table: &str, key: &str, ts: Timestamp) -> Option<Row> {
        self.cells
            .get(&(table.to_string(), key.to_string()))
            .and_then(|versions| versions.iter().rev().find(|v| v.ts <= ts))
            .and_then(|v| v.row.clone())
    }

    fn scan_at(&self, table: &str, ts: Timestamp) -> BTreeMap<String, Row> {
        self.cells
            .range((table.to_string(), String::new())..)
            .take_while(|((t, _), _)| t == table)
            .filter_map(|((_, key), versions)| {
                versions
                    .iter()
                    .rev()
                    .find(|v| v.ts <= ts)
                    .and_then(|v| v.row.clone())
                    .map(|row| (key.clone(), row))
            })
            .collect()
    }

    fn last_write(&self, table: &str, key: &str) -> Timestamp {
        self.cells
            .get(&(table.to_string(), key.to_string()))
            .and_then(|versions| versions.last())
            .map_or(0, |v| v.ts)
    }

    fn apply(&mut self, mutations: &[Mutation]) -> Timestamp {
        self.clock += 1;
        let ts = self.clock;
        for mutation in mutations {
            self.cells
                .entry((mutation.table().to_string(), mutation.key().to_string()))
                .or_default()
                .push(Version {
                    ts,
                    row: mutation.row().cloned(),
                });
        }
        ts
    }
}

#[derive(Default)]
struct Buffer {
    /// Writes in order, flagged when visible to the transaction's own reads.
    writes: Vec<(Mutation, bool)>,
    finished: bool,
}

/// Handle of an open distributed SQL transaction.
pub struct DistTransaction {
    id: Uuid,
    mode: TxMode,
    read_ts: Timestamp,
    buffer: Mutex<Buffer>,
}

impl DistTransaction {
    fn new(mode: TxMode, read_ts: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            read_ts,
            buffer: Mutex::new(Buffer::default()),
        }
    }

    /// Transaction identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read-write or read-only.
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Snapshot the transaction reads at.
    pub fn read_timestamp(&self) -> Timestamp {
        self.read_ts
    }

    fn push(&self, mutations: Vec<Mutation>, visible: bool) -> Result<(), BackendError> {
        if self.mode == TxMode::ReadOnly {
            return Err(BackendError::ReadOnlyViolation(format!(
                "{} mutations",
                mutations.len()
            )));
        }
        let mut buffer = self.buffer.lock();
        if buffer.finished {
            return Err(BackendError::TransactionFinished(self.id.to_string()));
        }
        buffer
            .writes
            .extend(mutations.into_iter().map(|m| (m, visible)));
        Ok(())
    }

    fn finish(&self) -> Result<Vec<Mutation>, BackendError> {
        let mut buffer = self.buffer.lock();
        if buffer.finished {
            return Err(BackendError::TransactionFinished(self.id.to_string()));
        }
        buffer.finished = true;
        Ok(std::mem::take(&mut buffer.writes)
            .into_iter()
            .map(|(m, _)| m)
            .collect())
    }
}

impl fmt::Debug for DistTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistTransaction")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("read_ts", &self.read_ts)
            .finish()
    }
}

/// In-memory multi-version database.
pub struct DistDatabase {
    name: String,
    versions: RwLock<Versions>,
    fail_commit: AtomicBool,
}

impl DistDatabase {
    /// Empty database at timestamp 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: RwLock::new(Versions::default()),
            fail_commit: AtomicBool::new(false),
        }
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest commit timestamp.
    pub fn current_timestamp(&self) -> Timestamp {
        self.versions.read().clock
    }

    /// Fail the next read-write commit.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Apply mutations in one commit, returning its timestamp.
    pub fn apply(&self, mutations: &[Mutation]) -> Timestamp {
        self.versions.write().apply(mutations)
    }

    /// Latest committed row.
    pub fn read_row(&self, table: &str, key: &str) -> Option<Row> {
        let versions = self.versions.read();
        versions.read_at(table, key, versions.clock)
    }

    /// Row as of `ts`.
    pub fn read_row_at(&self, table: &str, key: &str, ts: Timestamp) -> Option<Row> {
        self.versions.read().read_at(table, key, ts)
    }

    /// Latest committed rows of `table`, ordered by key.
    pub fn read_all(&self, table: &str) -> Vec<(String, Row)> {
        let versions = self.versions.read();
        versions.scan_at(table, versions.clock).into_iter().collect()
    }

    /// Run `statement` outside any transaction, in one commit.
    pub fn partitioned_update(&self, statement: &Statement) -> usize {
        let mut versions = self.versions.write();
        let rows: Vec<_> = versions
            .scan_at(statement.table(), versions.clock)
            .into_iter()
            .collect();
        let mutations = statement.plan(&rows);
        if !mutations.is_empty() {
            versions.apply(&mutations);
        }
        mutations.len()
    }

    // =========================================================================
    // Transactional view
    // =========================================================================

    fn view(&self, tx: &DistTransaction, table: &str) -> Result<BTreeMap<String, Row>, BackendError> {
        let buffer = tx.buffer.lock();
        if buffer.finished {
            return Err(BackendError::TransactionFinished(tx.id.to_string()));
        }
        let mut rows = self.versions.read().scan_at(table, tx.read_ts);
        for (mutation, _) in buffer
            .writes
            .iter()
            .filter(|(m, visible)| *visible && m.table() == table)
        {
            match mutation.row() {
                Some(row) => rows.insert(mutation.key().to_string(), row.clone()),
                None => rows.remove(mutation.key()),
            };
        }
        Ok(rows)
    }

    fn read_row_in(
        &self,
        tx: &DistTransaction,
        table: &str,
        key: &str,
    ) -> Result<Option<Row>, BackendError> {
        Ok(self.view(tx, table)?.remove(key))
    }

    fn read_all_in(&self, tx: &DistTransaction, table: &str) -> Result<Vec<(String, Row)>, BackendError> {
        Ok(self.view(tx, table)?.into_iter().collect())
    }

    fn update_in(&self, tx: &DistTransaction, statement: &Statement) -> Result<usize, BackendError> {
        if tx.mode != TxMode::ReadWrite {
            return Err(BackendError::TransactionRequired(format!("{statement:?}")));
        }
        let rows: Vec<_> = self.view(tx, statement.table())?.into_iter().collect();
        let mutations = statement.plan(&rows);
        let affected = mutations.len();
        tx.push(mutations, true)?;
        Ok(affected)
    }

    fn check_conflicts(
        versions: &Versions,
        tx: &DistTransaction,
        mutations: &[Mutation],
    ) -> Result<(), BackendError> {
        for mutation in mutations {
            let written = versions.last_write(mutation.table(), mutation.key());
            if written > tx.read_ts {
                return Err(BackendError::Conflict(format!(
                    "{}/{} written at {} after snapshot {}",
                    mutation.table(),
                    mutation.key(),
                    written,
                    tx.read_ts
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TxBackend for DistDatabase {
    type Handle = DistTransaction;

    fn kind(&self) -> &'static str {
        "distsql"
    }

    async fn begin(&self, config: &TxConfig) -> Result<DistTransaction, BackendError> {
        let now = self.current_timestamp();
        let bound = config.vendor::<StaleRead>().map(|stale| stale.0);
        let tx = if config.read_only {
            let bound = bound.unwrap_or(TimestampBound::Strong);
            DistTransaction::new(TxMode::ReadOnly, bound.resolve(now))
        } else {
            if bound.is_some() {
                debug!(database = %self.name, "[tx-backends] Stale read ignored for read-write transaction");
            }
            DistTransaction::new(TxMode::ReadWrite, now)
        };
        debug!(
            database = %self.name,
            tx = %tx.id,
            mode = ?tx.mode,
            read_ts = tx.read_ts,
            "[tx-backends] distsql transaction opened"
        );
        Ok(tx)
    }

    async fn commit(&self, tx: &DistTransaction) -> Result<(), BackendError> {
        let mutations = tx.finish()?;
        if tx.mode == TxMode::ReadOnly {
            return Ok(());
        }
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Injected(format!("commit on {}", self.name)));
        }

        let mut versions = self.versions.write();
        Self::check_conflicts(&versions, tx, &mutations)?;
        let ts = if mutations.is_empty() {
            versions.clock
        } else {
            versions.apply(&mutations)
        };
        debug!(
            database = %self.name,
            tx = %tx.id,
            commit_ts = ts,
            mutations = mutations.len(),
            "[tx-backends] distsql transaction committed"
        );
        Ok(())
    }

    async fn rollback(&self, tx: &DistTransaction) -> Result<(), BackendError> {
        let discarded = tx.finish()?;
        debug!(
            database = %self.name,
            tx = %tx.id,
            discarded = discarded.len(),
            "[tx-backends] distsql transaction rolled back"
        );
        Ok(())
    }
}

impl fmt::Debug for DistDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistDatabase")
            .field("name", &self.name)
            .field("timestamp", &self.current_timestamp())
            .finish()
    }
}
