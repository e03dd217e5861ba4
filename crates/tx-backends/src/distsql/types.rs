//! Mutations, DML statements and read bounds for the distributed SQL backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row, keyed separately by its primary key.
pub type Row = Value;

/// Logical commit timestamp.
pub type Timestamp = u64;

/// Row-level write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Write `row` under `key`, replacing any existing row.
    InsertOrUpdate {
        /// Table name
        table: String,
        /// Primary key
        key: String,
        /// Row contents
        row: Row,
    },
    /// Remove the row under `key`.
    Delete {
        /// Table name
        table: String,
        /// Primary key
        key: String,
    },
}

impl Mutation {
    /// Insert-or-update mutation.
    pub fn insert_or_update(table: impl Into<String>, key: impl Into<String>, row: Row) -> Self {
        Self::InsertOrUpdate {
            table: table.into(),
            key: key.into(),
            row,
        }
    }

    /// Delete mutation.
    pub fn delete(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Delete {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Table written.
    pub fn table(&self) -> &str {
        match self {
            Self::InsertOrUpdate { table, .. } | Self::Delete { table, .. } => table,
        }
    }

    /// Primary key written.
    pub fn key(&self) -> &str {
        match self {
            Self::InsertOrUpdate { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    /// Row after the write, `None` for a delete.
    pub(crate) fn row(&self) -> Option<&Row> {
        match self {
            Self::InsertOrUpdate { row, .. } => Some(row),
            Self::Delete { .. } => None,
        }
    }
}

/// Set-based DML statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Set `column` to `value` on every row of `table`.
    SetColumn {
        /// Table name
        table: String,
        /// Column to overwrite
        column: String,
        /// New value
        value: Value,
    },
    /// Delete every row of `table`.
    DeleteAll {
        /// Table name
        table: String,
    },
}

impl Statement {
    /// Table the statement touches.
    pub fn table(&self) -> &str {
        match self {
            Self::SetColumn { table, .. } | Self::DeleteAll { table } => table,
        }
    }

    /// Mutations equivalent to running the statement over `rows`.
    pub(crate) fn plan(&self, rows: &[(String, Row)]) -> Vec<Mutation> {
        match self {
            Self::SetColumn {
                table,
                column,
                value,
            } => rows
                .iter()
                .map(|(key, row)| {
                    let mut row = row.clone();
                    if let Value::Object(fields) = &mut row {
                        fields.insert(column.clone(), value.clone());
                    }
                    Mutation::insert_or_update(table.clone(), key.clone(), row)
                })
                .collect(),
            Self::DeleteAll { table } => rows
                .iter()
                .map(|(key, _)| Mutation::delete(table.clone(), key.clone()))
                .collect(),
        }
    }
}

/// Snapshot selection for read-only transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampBound {
    /// Latest committed data.
    Strong,
    /// Data as of an exact commit timestamp (clamped to the current one).
    ReadTimestamp(Timestamp),
    /// Data as of the given number of commits ago.
    ExactStaleness(u64),
}

impl TimestampBound {
    /// Snapshot timestamp given the current commit timestamp.
    pub fn resolve(&self, now: Timestamp) -> Timestamp {
        match *self {
            Self::Strong => now,
            Self::ReadTimestamp(ts) => ts.min(now),
            Self::ExactStaleness(commits) => now.saturating_sub(commits),
        }
    }
}

/// Vendor option selecting the snapshot of a read-only transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleRead(pub TimestampBound);
