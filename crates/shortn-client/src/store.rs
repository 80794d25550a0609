use crate::connection::{Connection, ConnectionManager};
use crate::error::{Result, StoreError};
use crate::metrics::{NoopMetrics, StoreMetrics};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use jiff::Timestamp;
use shortn_core::{
    BackendError, ColumnClient, ConsistencyLevel, Connector, ShortCode, UrlRecord,
};
use std::sync::Arc;
use tokio::sync::RwLockReadGuard;
use tracing::{debug, error, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_KEYSPACE: &str = "shortn";
pub const DEFAULT_COLUMN_FAMILY: &str = "links";

/// How the two attributes of a link are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// One backend mutation carrying both columns.
    #[default]
    Batched,
    /// `url` first, then `owner`, as two separate writes. A failed second
    /// write leaves the destination readable.
    Sequential,
}

/// What to do when a code already maps to a different URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Replace the existing record.
    #[default]
    Overwrite,
    /// Fail with [`StoreError::Collision`].
    Reject,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct StoreOptions {
    #[builder(default = DEFAULT_KEYSPACE.to_string(), setter(into))]
    pub keyspace: String,
    /// Column family holding one row per short code.
    #[builder(default = DEFAULT_COLUMN_FAMILY.to_string(), setter(into))]
    pub column_family: String,
    #[builder(default)]
    pub consistency: ConsistencyLevel,
    #[builder(default)]
    pub write_mode: WriteMode,
    #[builder(default)]
    pub collision_policy: CollisionPolicy,
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Short link storage as seen by the HTTP layer.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Returns the destination stored under `code`, or `None` if there is none.
    async fn lookup_url(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Stores `url` on behalf of `owner` and returns its short link (`/<code>`).
    async fn add_url(&self, url: &str, owner: &str) -> Result<String>;
}

/// Maps short codes to destination URLs on a column-store backend.
///
/// Each link is one row keyed by its short code, with a `url` and an
/// `owner` column. All operations share one connection owned by a
/// [`ConnectionManager`] and reopen it on demand.
pub struct UrlStore<C: Connector> {
    connection: ConnectionManager<C>,
    metrics: Arc<dyn StoreMetrics>,
    options: StoreOptions,
}

impl<C: Connector> UrlStore<C> {
    /// Creates a store without connecting. The first operation connects.
    pub fn new(connector: C, options: StoreOptions) -> Self {
        Self::with_metrics(connector, options, Arc::new(NoopMetrics))
    }

    pub fn with_metrics(
        connector: C,
        options: StoreOptions,
        metrics: Arc<dyn StoreMetrics>,
    ) -> Self {
        let connection =
            ConnectionManager::new(connector, &options.keyspace, &options.column_family);
        Self {
            connection,
            metrics,
            options,
        }
    }

    /// Creates a store and opens its connection, retrying per the store's
    /// retry policy.
    pub async fn connect(
        connector: C,
        options: StoreOptions,
        metrics: Arc<dyn StoreMetrics>,
    ) -> Result<Self> {
        let store = Self::with_metrics(connector, options, metrics);
        drop(store.open_connection().await?);
        Ok(store)
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }

    /// Returns the open connection, reconnecting with backoff as needed.
    async fn open_connection(&self) -> Result<RwLockReadGuard<'_, Connection<C::Client>>> {
        let retry = &self.options.retry;
        let mut failures = 0_u32;

        loop {
            if let Some(conn) = self.connection.read().await {
                return Ok(conn);
            }

            let Err(e) = self.connection.ensure_open().await else {
                continue;
            };
            failures += 1;

            if retry.is_exhausted(failures) {
                error!(
                    addr = %self.connection.addr(),
                    attempts = failures,
                    error = %e,
                    "Giving up connecting to backend"
                );
                return Err(StoreError::ConnectionExhausted {
                    attempts: failures,
                    source: e,
                });
            }

            let delay = retry.delay_for(failures);
            warn!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Backend connection failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Logs and counts a failed backend call.
    fn record_failure(&self, operation: &str, code: &ShortCode, error: &BackendError) {
        match error {
            BackendError::InvalidRequest(_) => {
                warn!(operation, code = %code, error = %error, "Invalid request to backend")
            }
            BackendError::Unavailable(_) => {
                warn!(operation, code = %code, error = %error, "Backend unavailable")
            }
            BackendError::Timeout(_) => {
                warn!(operation, code = %code, error = %error, "Backend timed out")
            }
            BackendError::Transport(_) => {
                warn!(operation, code = %code, error = %error, "Backend transport failure")
            }
        }
        self.metrics.inc_error(error.reason());
    }

    pub async fn lookup_url(&self, code: &ShortCode) -> Result<Option<String>> {
        let conn = self.open_connection().await?;

        let column = conn
            .client
            .get(code.as_str(), &conn.url_path, self.options.consistency)
            .await
            .inspect_err(|e| self.record_failure("lookup", code, e))?;

        match column {
            Some(column) => {
                trace!(code = %code, url = %column.value, "Found url");
                self.metrics.inc_found();
                Ok(Some(column.value))
            }
            None => {
                self.metrics.inc_not_found();
                Ok(None)
            }
        }
    }

    pub async fn add_url(&self, url: &str, owner: &str) -> Result<String> {
        validate_url(url)?;

        let code = ShortCode::derive(url);
        let conn = self.open_connection().await?;

        if self.options.collision_policy == CollisionPolicy::Reject {
            let existing = conn
                .client
                .get(code.as_str(), &conn.url_path, self.options.consistency)
                .await
                .inspect_err(|e| self.record_failure("collision check", &code, e))?;

            if let Some(existing) = existing.filter(|column| column.value != url) {
                warn!(code = %code, existing = %existing.value, url, "Short code collision");
                return Err(StoreError::Collision(code));
            }
        }

        let parent = conn.url_path.parent();
        let columns = UrlRecord::new(url, owner).into_columns(Timestamp::now());

        match self.options.write_mode {
            WriteMode::Batched => {
                conn.client
                    .batch_insert(code.as_str(), &parent, &columns, self.options.consistency)
                    .await
                    .inspect_err(|e| self.record_failure("write", &code, e))?;
            }
            WriteMode::Sequential => {
                for column in &columns {
                    conn.client
                        .insert(code.as_str(), &parent, column, self.options.consistency)
                        .await
                        .inspect_err(|e| self.record_failure("write", &code, e))?;
                }
            }
        }

        debug!(code = %code, url, owner, "Stored short link");
        Ok(code.to_link())
    }
}

#[async_trait]
impl<C: Connector> LinkStore for UrlStore<C> {
    async fn lookup_url(&self, code: &ShortCode) -> Result<Option<String>> {
        UrlStore::lookup_url(self, code).await
    }

    async fn add_url(&self, url: &str, owner: &str) -> Result<String> {
        UrlStore::add_url(self, url, owner).await
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(StoreError::InvalidUrl("URL cannot be empty".to_string()));
    }

    if url.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(StoreError::InvalidUrl(format!(
            "URL contains whitespace or control characters: {url:?}"
        )));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(StoreError::InvalidUrl(format!(
            "URL must have a scheme and host: {url}"
        )));
    };

    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(StoreError::InvalidUrl(format!(
            "URL scheme must be http or https: {scheme}"
        )));
    }

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(StoreError::InvalidUrl(format!("URL has no host: {url}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Counters, ERRORS, FOUND, NOT_FOUND};
    use shortn_core::{Column, ColumnParent, ConnectError};
    use shortn_storage::InMemoryColumnStore;
    use std::time::Duration;

    const URL: &str = "https://example.com/x";

    fn fast_retry(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    fn options() -> StoreOptions {
        StoreOptions::builder().retry(fast_retry(Some(5))).build()
    }

    fn setup_with(
        options: StoreOptions,
    ) -> (InMemoryColumnStore, UrlStore<InMemoryColumnStore>, Arc<Counters>) {
        let backend = InMemoryColumnStore::with_keyspace(DEFAULT_KEYSPACE);
        let counters = Arc::new(Counters::new());
        let store = UrlStore::with_metrics(backend.clone(), options, counters.clone());
        (backend, store, counters)
    }

    fn setup() -> (InMemoryColumnStore, UrlStore<InMemoryColumnStore>, Arc<Counters>) {
        setup_with(options())
    }

    fn peek(backend: &InMemoryColumnStore, code: &ShortCode, column: &str) -> Option<String> {
        backend.peek(DEFAULT_KEYSPACE, DEFAULT_COLUMN_FAMILY, code.as_str(), column)
    }

    #[tokio::test]
    async fn round_trip() {
        let (backend, store, counters) = setup();

        let link = store.add_url(URL, "alice").await.unwrap();
        let code = ShortCode::derive(URL);
        assert_eq!(link, format!("/{code}"));

        let found = store.lookup_url(&code).await.unwrap();
        assert_eq!(found.as_deref(), Some(URL));
        assert_eq!(peek(&backend, &code, "owner").as_deref(), Some("alice"));
        assert_eq!(counters.get(FOUND), 1);
        assert_eq!(counters.get(NOT_FOUND), 0);
    }

    #[tokio::test]
    async fn link_does_not_depend_on_owner() {
        let (_backend, store, _counters) = setup();

        let first = store.add_url(URL, "alice").await.unwrap();
        let second = store.add_url(URL, "bob").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn repeated_add_overwrites() {
        let (backend, store, _counters) = setup();
        let code = ShortCode::derive(URL);

        store.add_url(URL, "alice").await.unwrap();
        store.add_url(URL, "bob").await.unwrap();

        assert_eq!(store.lookup_url(&code).await.unwrap().as_deref(), Some(URL));
        assert_eq!(peek(&backend, &code, "owner").as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (_backend, store, counters) = setup();
        let code = ShortCode::parse("AAAAAAA").unwrap();

        assert_eq!(store.lookup_url(&code).await.unwrap(), None);
        assert_eq!(counters.get(NOT_FOUND), 1);
        assert_eq!(counters.get(FOUND), 0);
        assert!(counters.snapshot().get(ERRORS).is_none());
    }

    #[tokio::test]
    async fn lookup_failures_are_counted_by_reason() {
        let cases = [
            (BackendError::InvalidRequest("bad".into()), "invalid-request"),
            (BackendError::Unavailable("down".into()), "unavailable"),
            (BackendError::Timeout("slow".into()), "timeout"),
            (BackendError::Transport("reset".into()), "os-error"),
        ];

        for (error, reason) in cases {
            let (backend, store, counters) = setup();
            backend.fail_next_get(error.clone());

            let err = store.lookup_url(&ShortCode::derive(URL)).await.unwrap_err();
            assert!(matches!(err, StoreError::Backend(ref e) if *e == error));
            assert_eq!(counters.get_labelled(ERRORS, reason), 1, "{reason}");
            assert_eq!(counters.get(FOUND) + counters.get(NOT_FOUND), 0);
        }
    }

    #[tokio::test]
    async fn sequential_owner_failure_leaves_url_readable() {
        let options = StoreOptions::builder()
            .write_mode(WriteMode::Sequential)
            .retry(fast_retry(Some(5)))
            .build();
        let (backend, store, counters) = setup_with(options);
        backend.fail_next_insert("owner", BackendError::Timeout("slow".into()));

        let err = store.add_url(URL, "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(BackendError::Timeout(_))));
        assert_eq!(counters.get_labelled(ERRORS, "timeout"), 1);

        let code = ShortCode::derive(URL);
        assert_eq!(store.lookup_url(&code).await.unwrap().as_deref(), Some(URL));
        assert_eq!(peek(&backend, &code, "owner"), None);
    }

    #[tokio::test]
    async fn sequential_url_failure_skips_owner() {
        let options = StoreOptions::builder()
            .write_mode(WriteMode::Sequential)
            .retry(fast_retry(Some(5)))
            .build();
        let (backend, store, counters) = setup_with(options);
        backend.fail_next_insert("url", BackendError::Unavailable("down".into()));

        store.add_url(URL, "alice").await.unwrap_err();
        assert_eq!(counters.get_labelled(ERRORS, "unavailable"), 1);

        let code = ShortCode::derive(URL);
        assert_eq!(peek(&backend, &code, "url"), None);
        assert_eq!(peek(&backend, &code, "owner"), None);
    }

    #[tokio::test]
    async fn failed_batch_writes_nothing() {
        let (backend, store, counters) = setup();
        backend.fail_next_batch(BackendError::Unavailable("down".into()));

        let err = store.add_url(URL, "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(BackendError::Unavailable(_))));
        assert_eq!(counters.get_labelled(ERRORS, "unavailable"), 1);

        let code = ShortCode::derive(URL);
        assert_eq!(store.lookup_url(&code).await.unwrap(), None);
        assert_eq!(peek(&backend, &code, "owner"), None);
    }

    #[tokio::test]
    async fn invalid_urls_never_reach_the_backend() {
        let (backend, store, counters) = setup();

        for url in [
            "",
            "example.com",
            "ftp://example.com",
            "https://",
            "http:///path",
            "https://example.com/a\nb",
            "https://example.com/a\r\nLocation: x",
        ] {
            let err = store.add_url(url, "alice").await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidUrl(_)), "{url:?}");
        }
        assert_eq!(backend.connection_count(), 0);
        assert!(counters.snapshot().is_empty());
    }

    #[tokio::test]
    async fn reject_policy_refuses_a_different_url() {
        let options = StoreOptions::builder()
            .collision_policy(CollisionPolicy::Reject)
            .retry(fast_retry(Some(5)))
            .build();
        let (backend, store, _counters) = setup_with(options);
        let code = ShortCode::derive(URL);

        // Plant a different destination under the code URL hashes to.
        let mut client = backend.connect().await.unwrap();
        client.set_keyspace(DEFAULT_KEYSPACE).await.unwrap();
        let squatter = Column::new("url", "https://other.example", Timestamp::now());
        client
            .insert(
                code.as_str(),
                &ColumnParent::new(DEFAULT_COLUMN_FAMILY),
                &squatter,
                ConsistencyLevel::One,
            )
            .await
            .unwrap();

        let err = store.add_url(URL, "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Collision(ref c) if *c == code));
        assert_eq!(
            peek(&backend, &code, "url").as_deref(),
            Some("https://other.example")
        );
    }

    #[tokio::test]
    async fn reject_policy_allows_the_same_url_again() {
        let options = StoreOptions::builder()
            .collision_policy(CollisionPolicy::Reject)
            .retry(fast_retry(Some(5)))
            .build();
        let (_backend, store, _counters) = setup_with(options);

        store.add_url(URL, "alice").await.unwrap();
        store.add_url(URL, "bob").await.unwrap();
    }

    #[tokio::test]
    async fn dropped_connection_is_reopened() {
        let (backend, store, _counters) = setup();
        store.add_url(URL, "alice").await.unwrap();

        backend.drop_connections();

        let code = ShortCode::derive(URL);
        assert_eq!(store.lookup_url(&code).await.unwrap().as_deref(), Some(URL));
        assert_eq!(store.connection().connection_count(), 2);
    }

    #[tokio::test]
    async fn transport_failure_forces_a_reconnect() {
        let (backend, store, _counters) = setup();
        let code = ShortCode::derive(URL);
        backend.fail_next_get(BackendError::Transport("reset".into()));

        store.lookup_url(&code).await.unwrap_err();
        assert!(!store.connection().is_open().await);

        assert_eq!(store.lookup_url(&code).await.unwrap(), None);
        assert_eq!(store.connection().connection_count(), 2);
    }

    #[tokio::test]
    async fn refused_connections_are_retried() {
        let (backend, store, _counters) = setup();
        backend.refuse_connections(3);

        let code = ShortCode::derive(URL);
        assert_eq!(store.lookup_url(&code).await.unwrap(), None);
        assert_eq!(store.connection().connection_count(), 1);
    }

    #[tokio::test]
    async fn retry_budget_is_enforced() {
        let options = StoreOptions::builder().retry(fast_retry(Some(3))).build();
        let (backend, store, counters) = setup_with(options);
        backend.refuse_connections(10);

        let err = store.add_url(URL, "alice").await.unwrap_err();
        match err {
            StoreError::ConnectionExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, ConnectError::Transport { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(counters.snapshot().is_empty());
    }

    #[tokio::test]
    async fn unbounded_retry_outlasts_a_long_outage() {
        let options = StoreOptions::builder().retry(fast_retry(None)).build();
        let (backend, store, _counters) = setup_with(options);
        backend.refuse_connections(25);

        store.add_url(URL, "alice").await.unwrap();
    }

    #[tokio::test]
    async fn connect_opens_eagerly() {
        let backend = InMemoryColumnStore::with_keyspace(DEFAULT_KEYSPACE);
        let store = UrlStore::connect(backend.clone(), options(), Arc::new(NoopMetrics))
            .await
            .unwrap();

        assert!(store.connection().is_open().await);
        assert_eq!(backend.connection_count(), 1);

        store.close().await;
        assert!(!store.connection().is_open().await);
    }

    #[tokio::test]
    async fn connect_fails_without_keyspace() {
        let backend = InMemoryColumnStore::new();
        let options = StoreOptions::builder().retry(fast_retry(Some(2))).build();

        let err = UrlStore::connect(backend, options, Arc::new(NoopMetrics))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StoreError::ConnectionExhausted {
                source: ConnectError::Keyspace { .. },
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_lookups_reconnect_once() {
        let (backend, store, counters) = setup();
        store.add_url(URL, "alice").await.unwrap();
        backend.drop_connections();
        backend.set_connect_delay(Some(Duration::from_millis(50)));

        let store = Arc::new(store);
        let code = ShortCode::derive(URL);
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let code = code.clone();
                tokio::spawn(async move { store.lookup_url(&code).await })
            })
            .collect();

        for handle in handles {
            let found = handle.await.unwrap().unwrap();
            assert_eq!(found.as_deref(), Some(URL));
        }
        assert_eq!(store.connection().connection_count(), 2);
        assert_eq!(counters.get(FOUND), 32);
    }

    #[tokio::test]
    async fn usable_through_the_trait_object() {
        let (_backend, store, _counters) = setup();
        let store: Arc<dyn LinkStore> = Arc::new(store);

        let link = store.add_url(URL, "alice").await.unwrap();
        let code = ShortCode::parse(link.trim_start_matches('/')).unwrap();
        assert_eq!(store.lookup_url(&code).await.unwrap().as_deref(), Some(URL));
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("HTTP://example.com/a?b#c").is_ok());
        assert!(validate_url("http://localhost:8080").is_ok());

        assert!(validate_url("").is_err());
        assert!(validate_url("mailto:someone@example.com").is_err());
        assert!(validate_url("https://?q=1").is_err());
        assert!(validate_url("https://example.com/a\nb").is_err());
        assert!(validate_url("https://example.com/a b").is_err());
        assert!(validate_url("https://example.com/\tx").is_err());
        assert!(validate_url("https://example.com/\u{7f}").is_err());
    }
}
