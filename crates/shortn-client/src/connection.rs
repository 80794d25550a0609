use shortn_core::{ColumnClient, ColumnPath, ConnectError, Connector, URL_COLUMN};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{error, info, trace};

/// An open client plus the column path it was opened for.
pub struct Connection<T> {
    pub client: T,
    /// Path of the `url` column inside the configured column family.
    pub url_path: ColumnPath,
}

/// Owns the single live connection shared by every store operation.
///
/// Readers take the shared side of the lock for the whole duration of a
/// backend call. Opening or replacing the connection takes the exclusive
/// side, and the open check is repeated once it is held, so concurrent
/// callers that all find the connection closed produce exactly one new
/// connection between them.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    keyspace: String,
    column_family: String,
    state: RwLock<Option<Connection<C::Client>>>,
    opened: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager with no connection. Nothing is opened until
    /// [`ensure_open`](Self::ensure_open) runs.
    pub fn new(
        connector: C,
        keyspace: impl Into<String>,
        column_family: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            keyspace: keyspace.into(),
            column_family: column_family.into(),
            state: RwLock::new(None),
            opened: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> &str {
        self.connector.addr()
    }

    /// Number of connections this manager has successfully opened.
    pub fn connection_count(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub async fn is_open(&self) -> bool {
        self.state
            .read()
            .await
            .as_ref()
            .is_some_and(|conn| conn.client.is_open())
    }

    /// Returns the live connection under the shared lock, or `None` when
    /// there is no open connection.
    pub async fn read(&self) -> Option<RwLockReadGuard<'_, Connection<C::Client>>> {
        let guard = self.state.read().await;
        RwLockReadGuard::try_map(guard, |state| {
            state.as_ref().filter(|conn| conn.client.is_open())
        })
        .ok()
    }

    /// Makes sure a usable connection exists, opening one if needed.
    ///
    /// On failure the manager stays without a connection and the error is
    /// handed back; deciding whether to retry is up to the caller.
    pub async fn ensure_open(&self) -> Result<(), ConnectError> {
        if self.is_open().await {
            return Ok(());
        }

        let mut state = self.state.write().await;
        if state.as_ref().is_some_and(|conn| conn.client.is_open()) {
            trace!("Connection was reopened while waiting for the lock");
            return Ok(());
        }

        if let Some(stale) = state.take() {
            stale.client.close().await;
        }

        let connection = self.open().await.inspect_err(|e| {
            error!(addr = %self.addr(), error = %e, "Failed to connect to backend");
        })?;
        *state = Some(connection);
        let count = self.opened.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            addr = %self.addr(),
            keyspace = %self.keyspace,
            connections = count,
            "Connected to backend"
        );
        Ok(())
    }

    async fn open(&self) -> Result<Connection<C::Client>, ConnectError> {
        let mut client = self.connector.connect().await?;

        if let Err(source) = client.set_keyspace(&self.keyspace).await {
            client.close().await;
            return Err(ConnectError::Keyspace {
                keyspace: self.keyspace.clone(),
                source,
            });
        }

        Ok(Connection {
            client,
            url_path: ColumnPath::new(&self.column_family, URL_COLUMN),
        })
    }

    /// Closes and forgets the current connection, if any.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if let Some(conn) = state.take() {
            conn.client.close().await;
            info!(addr = %self.addr(), "Closed backend connection");
        }
    }
}
