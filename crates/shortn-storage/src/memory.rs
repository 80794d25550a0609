use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use jiff::Timestamp;
use parking_lot::Mutex;
use shortn_core::backend::Result;
use shortn_core::{
    BackendError, Column, ColumnClient, ColumnParent, ColumnPath, ConnectError, ConsistencyLevel,
    Connector,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

const ADDR: &str = "memory";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    keyspace: String,
    column_family: String,
    key: String,
}

/// Failures queued to be returned by the next matching operations.
#[derive(Debug, Default)]
struct Faults {
    refused_connects: u32,
    get: VecDeque<BackendError>,
    insert: HashMap<String, VecDeque<BackendError>>,
    batch: VecDeque<BackendError>,
}

#[derive(Debug, Default)]
struct Shared {
    keyspaces: DashSet<String>,
    rows: DashMap<RowKey, HashMap<String, Column>>,
    faults: Mutex<Faults>,
    connect_delay: Mutex<Option<Duration>>,
    connections: AtomicU64,
    links: Mutex<Vec<Arc<AtomicBool>>>,
}

/// An in-process column store.
///
/// Cloning the store yields another handle to the same data, so a test can
/// keep one handle to inject faults while the store client owns another as
/// its [`Connector`]. Rows are kept in a [`DashMap`] and writes resolve
/// last-write-wins on the column timestamp.
#[derive(Debug, Clone, Default)]
pub struct InMemoryColumnStore {
    shared: Arc<Shared>,
}

impl InMemoryColumnStore {
    /// Creates an empty store with no keyspaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with `keyspace` already defined.
    pub fn with_keyspace(keyspace: impl Into<String>) -> Self {
        let store = Self::new();
        store.create_keyspace(keyspace);
        store
    }

    pub fn create_keyspace(&self, keyspace: impl Into<String>) {
        self.shared.keyspaces.insert(keyspace.into());
    }

    /// Number of connections handed out so far.
    pub fn connection_count(&self) -> u64 {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Makes the next `count` connection attempts fail.
    pub fn refuse_connections(&self, count: u32) {
        self.shared.faults.lock().refused_connects = count;
    }

    /// Delays every connection attempt, widening reconnect races in tests.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.shared.connect_delay.lock() = delay;
    }

    /// Makes the next read fail with `error`.
    pub fn fail_next_get(&self, error: BackendError) {
        self.shared.faults.lock().get.push_back(error);
    }

    /// Makes the next single-column write of `column` fail with `error`.
    pub fn fail_next_insert(&self, column: impl Into<String>, error: BackendError) {
        self.shared
            .faults
            .lock()
            .insert
            .entry(column.into())
            .or_default()
            .push_back(error);
    }

    /// Makes the next batched write fail with `error`.
    pub fn fail_next_batch(&self, error: BackendError) {
        self.shared.faults.lock().batch.push_back(error);
    }

    /// Severs every open connection, as if the server went away.
    pub fn drop_connections(&self) {
        for open in self.shared.links.lock().drain(..) {
            open.store(false, Ordering::SeqCst);
        }
    }

    /// Reads a column directly, bypassing connections and faults.
    pub fn peek(
        &self,
        keyspace: &str,
        column_family: &str,
        key: &str,
        column: &str,
    ) -> Option<String> {
        let row_key = RowKey {
            keyspace: keyspace.to_owned(),
            column_family: column_family.to_owned(),
            key: key.to_owned(),
        };
        self.shared
            .rows
            .get(&row_key)
            .and_then(|row| row.get(column).map(|c| c.value.clone()))
    }
}

#[async_trait]
impl Connector for InMemoryColumnStore {
    type Client = InMemoryClient;

    async fn connect(&self) -> std::result::Result<Self::Client, ConnectError> {
        let delay = *self.shared.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut faults = self.shared.faults.lock();
            if faults.refused_connects > 0 {
                faults.refused_connects -= 1;
                return Err(ConnectError::Transport {
                    addr: ADDR.to_owned(),
                    message: "connection refused".to_owned(),
                });
            }
        }

        let open = Arc::new(AtomicBool::new(true));
        self.shared.links.lock().push(Arc::clone(&open));
        self.shared.connections.fetch_add(1, Ordering::SeqCst);

        Ok(InMemoryClient {
            shared: Arc::clone(&self.shared),
            keyspace: None,
            open,
        })
    }

    fn addr(&self) -> &str {
        ADDR
    }
}

/// A connection to an [`InMemoryColumnStore`].
#[derive(Debug)]
pub struct InMemoryClient {
    shared: Arc<Shared>,
    keyspace: Option<String>,
    open: Arc<AtomicBool>,
}

impl InMemoryClient {
    fn row_key(&self, key: &str, column_family: &str) -> Result<RowKey> {
        if !self.is_open() {
            return Err(BackendError::Transport("connection closed".to_owned()));
        }
        let Some(keyspace) = &self.keyspace else {
            return Err(BackendError::InvalidRequest(
                "no keyspace has been set".to_owned(),
            ));
        };
        if key.is_empty() {
            return Err(BackendError::InvalidRequest(
                "key may not be empty".to_owned(),
            ));
        }
        Ok(RowKey {
            keyspace: keyspace.clone(),
            column_family: column_family.to_owned(),
            key: key.to_owned(),
        })
    }

    /// A transport failure also takes the connection down.
    fn fail(&self, error: BackendError) -> Result<()> {
        if matches!(error, BackendError::Transport(_)) {
            self.open.store(false, Ordering::SeqCst);
        }
        Err(error)
    }

    fn apply(&self, row_key: RowKey, columns: &[Column]) {
        let mut row = self.shared.rows.entry(row_key).or_default();
        for column in columns {
            match row.get(&column.name) {
                Some(existing) if existing.timestamp > column.timestamp => {
                    trace!(column = %column.name, "Dropping write older than stored column");
                }
                _ => {
                    row.insert(column.name.clone(), column.clone());
                }
            }
        }
    }
}

#[async_trait]
impl ColumnClient for InMemoryClient {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn set_keyspace(&mut self, keyspace: &str) -> Result<()> {
        if !self.is_open() {
            return Err(BackendError::Transport("connection closed".to_owned()));
        }
        if !self.shared.keyspaces.contains(keyspace) {
            return Err(BackendError::InvalidRequest(format!(
                "keyspace '{keyspace}' does not exist"
            )));
        }
        self.keyspace = Some(keyspace.to_owned());
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
        path: &ColumnPath,
        _consistency: ConsistencyLevel,
    ) -> Result<Option<Column>> {
        let row_key = self.row_key(key, &path.column_family)?;

        let fault = self.shared.faults.lock().get.pop_front();
        if let Some(error) = fault {
            self.fail(error)?;
        }

        let Some(row) = self.shared.rows.get(&row_key) else {
            return Ok(None);
        };
        let column = row
            .get(&path.column)
            .filter(|column| !column.is_expired(Timestamp::now()))
            .cloned();
        Ok(column)
    }

    async fn insert(
        &self,
        key: &str,
        parent: &ColumnParent,
        column: &Column,
        _consistency: ConsistencyLevel,
    ) -> Result<()> {
        let row_key = self.row_key(key, &parent.column_family)?;

        let fault = self
            .shared
            .faults
            .lock()
            .insert
            .get_mut(&column.name)
            .and_then(VecDeque::pop_front);
        if let Some(error) = fault {
            self.fail(error)?;
        }

        self.apply(row_key, std::slice::from_ref(column));
        Ok(())
    }

    async fn batch_insert(
        &self,
        key: &str,
        parent: &ColumnParent,
        columns: &[Column],
        _consistency: ConsistencyLevel,
    ) -> Result<()> {
        let row_key = self.row_key(key, &parent.column_family)?;

        let fault = self.shared.faults.lock().batch.pop_front();
        if let Some(error) = fault {
            self.fail(error)?;
        }

        self.apply(row_key, columns);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
