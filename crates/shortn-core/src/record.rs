use crate::column::Column;
use jiff::Timestamp;

/// Attribute holding the destination URL.
pub const URL_COLUMN: &str = "url";
/// Attribute holding the identity of whoever created the link.
pub const OWNER_COLUMN: &str = "owner";

/// A short link as written to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// The destination URL the short code redirects to.
    pub url: String,
    /// Identity of the principal who created the record.
    pub owner: String,
}

impl UrlRecord {
    pub fn new(url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            owner: owner.into(),
        }
    }

    /// The `url` and `owner` columns, in write order, stamped with `timestamp`.
    pub fn into_columns(self, timestamp: Timestamp) -> [Column; 2] {
        [
            Column::new(URL_COLUMN, self.url, timestamp),
            Column::new(OWNER_COLUMN, self.owner, timestamp),
        ]
    }
}
