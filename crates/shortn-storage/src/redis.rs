use async_trait::async_trait;
use jiff::Timestamp;
use redis::aio::MultiplexedConnection;
use shortn_core::backend::Result;
use shortn_core::{
    BackendError, Column, ColumnClient, ColumnParent, ColumnPath, ConnectError, ConsistencyLevel,
    Connector,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default deadline for connecting and for every single operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Writes `(name, value, timestamp)` triples into one hash, keeping whichever
/// value carries the newer timestamp. ARGV[1] is the row TTL in milliseconds
/// (0 for none).
const WRITE_COLUMNS: &str = r#"
local applied = 0
for i = 2, #ARGV, 3 do
  local name, value, ts = ARGV[i], ARGV[i + 1], tonumber(ARGV[i + 2])
  local current = tonumber(redis.call('HGET', KEYS[1], name .. '@ts'))
  if current == nil or current <= ts then
    redis.call('HSET', KEYS[1], name, value, name .. '@ts', ARGV[i + 2])
    applied = applied + 1
  end
end
if tonumber(ARGV[1]) > 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return applied
"#;

/// Server error codes that mean the data is temporarily out of reach.
const UNAVAILABLE_CODES: &[&str] = &[
    "CLUSTERDOWN",
    "MASTERDOWN",
    "LOADING",
    "TRYAGAIN",
    "BUSY",
    "NOREPLICAS",
];

fn map_redis_error(operation: &str, err: redis::RedisError) -> BackendError {
    let message = format!("{operation}: {err}");

    if err.is_timeout() {
        return BackendError::Timeout(message);
    }
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        return BackendError::Transport(message);
    }
    match err.code() {
        Some(code) if UNAVAILABLE_CODES.contains(&code) => BackendError::Unavailable(message),
        Some(_) => BackendError::InvalidRequest(message),
        None => BackendError::Transport(message),
    }
}

/// Awaits `request` for at most `timeout`, mapping both failure paths into
/// a [`BackendError`].
async fn with_deadline<T, F>(operation: &str, timeout: Duration, request: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(map_redis_error(operation, e)),
        Err(_) => Err(BackendError::Timeout(format!(
            "{operation}: no response within {timeout:?}"
        ))),
    }
}

fn timestamp_field(column: &str) -> String {
    format!("{column}@ts")
}

/// Opens connections to a Redis server that stores rows as hashes.
///
/// A row lives under `{keyspace}:{column_family}:{key}`; every column is a
/// hash field next to a `{column}@ts` field holding its write time in
/// microseconds. Column TTLs are applied to the whole row.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: redis::Client,
    addr: String,
    timeout: Duration,
}

impl RedisConnector {
    /// Creates a connector for a `redis://host:port` address.
    ///
    /// No connection is made until [`Connector::connect`] is called.
    pub fn new(addr: impl Into<String>) -> std::result::Result<Self, ConnectError> {
        let addr = addr.into();
        let client = redis::Client::open(addr.as_str()).map_err(|e| ConnectError::Transport {
            addr: addr.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            addr,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sets the deadline applied to connecting and to each operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Client = RedisColumnClient;

    async fn connect(&self) -> std::result::Result<Self::Client, ConnectError> {
        trace!(addr = %self.addr, "Opening Redis connection");

        let conn = tokio::time::timeout(
            self.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| ConnectError::Transport {
            addr: self.addr.clone(),
            message: format!("no connection within {:?}", self.timeout),
        })?
        .map_err(|e| ConnectError::Transport {
            addr: self.addr.clone(),
            message: e.to_string(),
        })?;

        debug!(addr = %self.addr, "Opened Redis connection");
        Ok(RedisColumnClient {
            conn,
            keyspace: None,
            open: AtomicBool::new(true),
            timeout: self.timeout,
            write_columns: redis::Script::new(WRITE_COLUMNS),
        })
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

/// A [`ColumnClient`] over one multiplexed Redis connection.
///
/// Redis has no replica acknowledgment setting, so every consistency level
/// behaves like [`ConsistencyLevel::One`].
pub struct RedisColumnClient {
    conn: MultiplexedConnection,
    keyspace: Option<String>,
    open: AtomicBool,
    timeout: Duration,
    write_columns: redis::Script,
}

impl RedisColumnClient {
    fn row_key(&self, column_family: &str, key: &str) -> Result<String> {
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
        Ok(format!("{keyspace}:{column_family}:{key}"))
    }

    /// Runs one Redis round trip under the operation deadline.
    ///
    /// Transport failures mark the client closed so the next caller reconnects.
    async fn run<T, F>(&self, operation: &str, request: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        if !self.is_open() {
            return Err(BackendError::Transport(format!(
                "{operation}: connection closed"
            )));
        }

        let error = match with_deadline(operation, self.timeout, request).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if matches!(error, BackendError::Transport(_)) {
            warn!(error = %error, "Redis connection lost");
            self.open.store(false, Ordering::SeqCst);
        }
        Err(error)
    }

    async fn write(&self, key: &str, parent: &ColumnParent, columns: &[Column]) -> Result<()> {
        let row = self.row_key(&parent.column_family, key)?;

        let ttl_ms = columns
            .iter()
            .filter_map(|column| column.ttl)
            .max()
            .map_or(0, |ttl| ttl.as_millis());

        let mut invocation = self.write_columns.key(&row);
        invocation.arg(ttl_ms.to_string());
        for column in columns {
            invocation
                .arg(&column.name)
                .arg(&column.value)
                .arg(column.timestamp.as_microsecond());
        }

        let mut conn = self.conn.clone();
        let applied: i64 = self
            .run("failed to write columns", invocation.invoke_async(&mut conn))
            .await?;

        trace!(row = %row, applied, "Wrote columns to Redis");
        Ok(())
    }
}

#[async_trait]
impl ColumnClient for RedisColumnClient {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn set_keyspace(&mut self, keyspace: &str) -> Result<()> {
        if keyspace.is_empty() || keyspace.contains(':') {
            return Err(BackendError::InvalidRequest(format!(
                "invalid keyspace name '{keyspace}'"
            )));
        }

        let mut conn = self.conn.clone();
        let ping = redis::cmd("PING");
        let _: String = self
            .run("failed to verify connection", ping.query_async(&mut conn))
            .await?;

        self.keyspace = Some(keyspace.to_owned());
        Ok(())
    }

    async fn get(
        &self,
        key: &str,
        path: &ColumnPath,
        _consistency: ConsistencyLevel,
    ) -> Result<Option<Column>> {
        let row = self.row_key(&path.column_family, key)?;

        let mut conn = self.conn.clone();
        let mut hmget = redis::cmd("HMGET");
        hmget
            .arg(&row)
            .arg(&path.column)
            .arg(timestamp_field(&path.column));
        let (value, micros): (Option<String>, Option<i64>) = self
            .run("failed to fetch column", hmget.query_async(&mut conn))
            .await?;

        let Some(value) = value else {
            return Ok(None);
        };
        let timestamp = micros
            .and_then(|micros| Timestamp::from_microsecond(micros).ok())
            .unwrap_or(Timestamp::UNIX_EPOCH);

        Ok(Some(Column::new(path.column.clone(), value, timestamp)))
    }

    async fn insert(
        &self,
        key: &str,
        parent: &ColumnParent,
        column: &Column,
        _consistency: ConsistencyLevel,
    ) -> Result<()> {
        self.write(key, parent, std::slice::from_ref(column)).await
    }

    async fn batch_insert(
        &self,
        key: &str,
        parent: &ColumnParent,
        columns: &[Column],
        _consistency: ConsistencyLevel,
    ) -> Result<()> {
        self.write(key, parent, columns).await
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
