use jiff::Timestamp;
use std::fmt::Display;
use std::time::Duration;

/// Replica acknowledgment policy for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyLevel {
    /// A single replica must acknowledge.
    #[default]
    One,
    /// A majority of replicas must acknowledge.
    Quorum,
    /// Every replica must acknowledge.
    All,
}

impl Display for ConsistencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyLevel::One => f.write_str("ONE"),
            ConsistencyLevel::Quorum => f.write_str("QUORUM"),
            ConsistencyLevel::All => f.write_str("ALL"),
        }
    }
}

/// A named attribute of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: String,
    /// Write time, used by the backend for last-write-wins resolution.
    pub timestamp: Timestamp,
    /// `None` means the column never expires.
    pub ttl: Option<Duration>,
}

impl Column {
    /// Creates a non-expiring column stamped with the given write time.
    pub fn new(name: impl Into<String>, value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
            ttl: None,
        }
    }

    /// Returns `true` if the column carries a TTL that has run out at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        jiff::SignedDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| self.timestamp.checked_add(ttl).ok())
            .is_some_and(|expire_at| now >= expire_at)
    }
}

/// Addresses a single column for reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath {
    pub column_family: String,
    pub column: String,
}

impl ColumnPath {
    pub fn new(column_family: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            column: column.into(),
        }
    }

    /// The parent used to write into the same column family.
    pub fn parent(&self) -> ColumnParent {
        ColumnParent::new(self.column_family.clone())
    }
}

/// Addresses a column family for writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnParent {
    pub column_family: String,
}

impl ColumnParent {
    pub fn new(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
        }
    }
}
