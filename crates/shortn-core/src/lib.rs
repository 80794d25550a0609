//! Core types and traits for the shortn URL shortener.
//!
//! This crate provides the short code type, the column model, and the
//! column-store capability traits that backends implement and the store
//! client consumes.

pub mod backend;
pub mod column;
pub mod error;
pub mod record;
pub mod shortcode;

pub use backend::{ColumnClient, Connector};
pub use column::{Column, ColumnParent, ColumnPath, ConsistencyLevel};
pub use error::{BackendError, ConnectError, CoreError};
pub use record::{UrlRecord, OWNER_COLUMN, URL_COLUMN};
pub use shortcode::ShortCode;
