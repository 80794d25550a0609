//! Store client for the shortn URL shortener.
//!
//! [`UrlStore`] derives short codes, writes link records, and resolves codes
//! back to destinations over any [`Connector`](shortn_core::Connector). Its
//! single backend connection is owned by a [`ConnectionManager`] that
//! reconnects on demand, retrying according to a [`RetryPolicy`].

pub mod connection;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod store;

pub use connection::{Connection, ConnectionManager};
pub use error::{Result, StoreError};
pub use metrics::{CounterValue, Counters, NoopMetrics, StoreMetrics};
pub use retry::RetryPolicy;
pub use store::{CollisionPolicy, LinkStore, StoreOptions, UrlStore, WriteMode};
