use crate::column::{Column, ColumnParent, ColumnPath, ConsistencyLevel};
use crate::error::{BackendError, ConnectError};
use async_trait::async_trait;

/// Result type for single-key backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Opens physical connections to a column-store backend.
///
/// A connector holds whatever is needed to reach the backend (address,
/// driver configuration) and hands out a freshly bound [`ColumnClient`] for
/// every successful [`connect`](Connector::connect).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Client: ColumnClient;

    /// Opens the transport and binds a protocol client to it.
    async fn connect(&self) -> std::result::Result<Self::Client, ConnectError>;

    /// A printable description of the backend address, used in diagnostics.
    fn addr(&self) -> &str;
}

/// A client bound to one open transport.
///
/// Reads and writes address a single row key. Backends report a missing row
/// or column as `Ok(None)` rather than an error.
#[async_trait]
pub trait ColumnClient: Send + Sync + 'static {
    /// Returns `false` once the underlying transport has been lost or closed.
    fn is_open(&self) -> bool;

    /// Selects the keyspace that scopes every subsequent operation.
    async fn set_keyspace(&mut self, keyspace: &str) -> Result<()>;

    /// Reads one column of the row stored under `key`.
    async fn get(
        &self,
        key: &str,
        path: &ColumnPath,
        consistency: ConsistencyLevel,
    ) -> Result<Option<Column>>;

    /// Writes one column of the row stored under `key`.
    async fn insert(
        &self,
        key: &str,
        parent: &ColumnParent,
        column: &Column,
        consistency: ConsistencyLevel,
    ) -> Result<()>;

    /// Writes several columns of the same row as one mutation.
    ///
    /// Either every column is applied or none is.
    async fn batch_insert(
        &self,
        key: &str,
        parent: &ColumnParent,
        columns: &[Column],
        consistency: ConsistencyLevel,
    ) -> Result<()>;

    /// Closes the transport. Further operations fail with a transport error.
    async fn close(&self);
}
