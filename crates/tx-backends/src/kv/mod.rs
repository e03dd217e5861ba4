//! # Key-Value Backend
//!
//! In-memory string store with MULTI/EXEC style transactions. A transaction is
//! a [`KvPipeline`]: commands are queued, return no value, and run together at
//! commit. Rollback discards the queue.
//!
//! The store has no read-only transactions; the `read_only` option is
//! accepted and ignored.

mod client;

pub use client::{KvClientProvider, KvWriter, Reply};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use tx_core::{BackendError, TxBackend, TxConfig};
use uuid::Uuid;

/// Command queued in a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KvCommand {
    /// Set `key` to `value`.
    Set {
        /// Key
        key: String,
        /// Value
        value: String,
    },
    /// Remove `key`.
    Del {
        /// Key
        key: String,
    },
}

#[derive(Default)]
struct Queue {
    commands: Vec<KvCommand>,
    finished: bool,
}

/// Queue of commands executed atomically at commit.
pub struct KvPipeline {
    id: Uuid,
    queue: Mutex<Queue>,
}

impl KvPipeline {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: Mutex::new(Queue::default()),
        }
    }

    /// Pipeline identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Commands queued so far.
    pub fn queued(&self) -> Vec<KvCommand> {
        self.queue.lock().commands.clone()
    }

    fn enqueue(&self, command: KvCommand) -> Result<(), BackendError> {
        let mut queue = self.queue.lock();
        if queue.finished {
            return Err(BackendError::TransactionFinished(self.id.to_string()));
        }
        queue.commands.push(command);
        Ok(())
    }

    fn finish(&self) -> Result<Vec<KvCommand>, BackendError> {
        let mut queue = self.queue.lock();
        if queue.finished {
            return Err(BackendError::TransactionFinished(self.id.to_string()));
        }
        queue.finished = true;
        Ok(std::mem::take(&mut queue.commands))
    }
}

impl fmt::Debug for KvPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvPipeline")
            .field("id", &self.id)
            .field("queued", &self.queue.lock().commands.len())
            .finish()
    }
}

/// In-memory key-value store.
pub struct KvStore {
    name: String,
    data: RwLock<HashMap<String, String>>,
    fail_exec: AtomicBool,
}

impl KvStore {
    /// Empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(HashMap::new()),
            fail_exec: AtomicBool::new(false),
        }
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fail the next pipeline execution.
    pub fn fail_next_exec(&self) {
        self.fail_exec.store(true, Ordering::SeqCst);
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    /// Whether `key` exists.
    pub fn exists(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Set `key` to `value`, returning the previous value.
    pub fn set(&self, key: &str, value: &str) -> Option<String> {
        self.data.write().insert(key.to_string(), value.to_string())
    }

    /// Remove `key`, returning whether it existed.
    pub fn del(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    fn execute(data: &mut HashMap<String, String>, command: KvCommand) {
        match command {
            KvCommand::Set { key, value } => {
                data.insert(key, value);
            }
            KvCommand::Del { key } => {
                data.remove(&key);
            }
        }
    }
}

#[async_trait]
impl TxBackend for KvStore {
    type Handle = KvPipeline;

    fn kind(&self) -> &'static str {
        "kv"
    }

    async fn begin(&self, config: &TxConfig) -> Result<KvPipeline, BackendError> {
        let pipeline = KvPipeline::new();
        debug!(
            store = %self.name,
            pipeline = %pipeline.id,
            read_only_ignored = config.read_only,
            "[tx-backends] kv pipeline opened"
        );
        Ok(pipeline)
    }

    async fn commit(&self, pipeline: &KvPipeline) -> Result<(), BackendError> {
        let commands = pipeline.finish()?;
        if self.fail_exec.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Injected(format!("exec on {}", self.name)));
        }
        let executed = commands.len();
        let mut data = self.data.write();
        for command in commands {
            Self::execute(&mut data, command);
        }
        debug!(
            store = %self.name,
            pipeline = %pipeline.id,
            executed,
            "[tx-backends] kv pipeline executed"
        );
        Ok(())
    }

    async fn rollback(&self, pipeline: &KvPipeline) -> Result<(), BackendError> {
        let discarded = pipeline.finish()?;
        debug!(
            store = %self.name,
            pipeline = %pipeline.id,
            discarded = discarded.len(),
            "[tx-backends] kv pipeline discarded"
        );
        Ok(())
    }
}

impl fmt::Debug for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("name", &self.name)
            .field("keys", &self.len())
            .finish()
    }
}
