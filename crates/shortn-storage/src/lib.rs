//! Column-store backends for shortn.
//!
//! Each backend provides a [`Connector`](shortn_core::Connector) that opens
//! [`ColumnClient`](shortn_core::ColumnClient)s:
//!
//! - [`InMemoryColumnStore`]: an in-process store with fault injection, used
//!   for tests and single-node runs.
//! - [`RedisConnector`]: rows stored as Redis hashes.

pub mod memory;
pub mod redis;

pub use memory::{InMemoryClient, InMemoryColumnStore};
pub use redis::{RedisColumnClient, RedisConnector};
