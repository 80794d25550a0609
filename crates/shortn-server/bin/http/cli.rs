use clap::{Parser, ValueEnum};
use shortn_client::store::{DEFAULT_COLUMN_FAMILY, DEFAULT_KEYSPACE};
use shortn_client::{CollisionPolicy, RetryPolicy, StoreOptions, WriteMode};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const BIND_ADDR_ENV: &str = "SHORTN_BIND_ADDR";
pub const BACKEND_ENV: &str = "SHORTN_BACKEND";
pub const BACKEND_ADDR_ENV: &str = "SHORTN_BACKEND_ADDR";
pub const BACKEND_TIMEOUT_MS_ENV: &str = "SHORTN_BACKEND_TIMEOUT_MS";
pub const KEYSPACE_ENV: &str = "SHORTN_KEYSPACE";
pub const CORPUS_ENV: &str = "SHORTN_CORPUS";
pub const RETRY_ATTEMPTS_ENV: &str = "SHORTN_RETRY_ATTEMPTS";
pub const RETRY_BASE_DELAY_MS_ENV: &str = "SHORTN_RETRY_BASE_DELAY_MS";
pub const RETRY_MAX_DELAY_MS_ENV: &str = "SHORTN_RETRY_MAX_DELAY_MS";
pub const WRITE_MODE_ENV: &str = "SHORTN_WRITE_MODE";
pub const COLLISION_POLICY_ENV: &str = "SHORTN_COLLISION_POLICY";
pub const LOG_FORMAT_ENV: &str = "SHORTN_LOG_FORMAT";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:80";
pub const DEFAULT_BACKEND_ADDR: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 50;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for BackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendArg::InMemory => write!(f, "in-memory"),
            BackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteModeArg {
    #[value(name = "batched")]
    Batched,
    #[value(name = "sequential")]
    Sequential,
}

impl Display for WriteModeArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteModeArg::Batched => write!(f, "batched"),
            WriteModeArg::Sequential => write!(f, "sequential"),
        }
    }
}

impl From<WriteModeArg> for WriteMode {
    fn from(arg: WriteModeArg) -> Self {
        match arg {
            WriteModeArg::Batched => WriteMode::Batched,
            WriteModeArg::Sequential => WriteMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollisionPolicyArg {
    #[value(name = "overwrite")]
    Overwrite,
    #[value(name = "reject")]
    Reject,
}

impl Display for CollisionPolicyArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionPolicyArg::Overwrite => write!(f, "overwrite"),
            CollisionPolicyArg::Reject => write!(f, "reject"),
        }
    }
}

impl From<CollisionPolicyArg> for CollisionPolicy {
    fn from(arg: CollisionPolicyArg) -> Self {
        match arg {
            CollisionPolicyArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionPolicyArg::Reject => CollisionPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shortn", about = "Serves short links stored in a column store")]
pub struct CLI {
    /// Address the web server listens on.
    #[arg(long, env = BIND_ADDR_ENV, default_value = DEFAULT_BIND_ADDR)]
    pub bind: SocketAddr,

    #[arg(
        long,
        env = BACKEND_ENV,
        value_enum,
        default_value_t = BackendArg::Redis
    )]
    pub backend: BackendArg,

    #[arg(long, env = BACKEND_ADDR_ENV, default_value = DEFAULT_BACKEND_ADDR)]
    pub backend_addr: String,

    /// Deadline for connecting and for each backend operation.
    #[arg(long, env = BACKEND_TIMEOUT_MS_ENV, default_value_t = DEFAULT_BACKEND_TIMEOUT_MS)]
    pub backend_timeout_ms: u64,

    #[arg(long, env = KEYSPACE_ENV, default_value = DEFAULT_KEYSPACE)]
    pub keyspace: String,

    /// Column family containing the short links for this service.
    #[arg(long, env = CORPUS_ENV, default_value = DEFAULT_COLUMN_FAMILY)]
    pub corpus: String,

    /// Failed connection attempts before giving up. 0 retries forever.
    #[arg(long, env = RETRY_ATTEMPTS_ENV, default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    pub retry_attempts: u32,

    #[arg(long, env = RETRY_BASE_DELAY_MS_ENV, default_value_t = DEFAULT_RETRY_BASE_DELAY_MS)]
    pub retry_base_delay_ms: u64,

    #[arg(long, env = RETRY_MAX_DELAY_MS_ENV, default_value_t = DEFAULT_RETRY_MAX_DELAY_MS)]
    pub retry_max_delay_ms: u64,

    #[arg(
        long,
        env = WRITE_MODE_ENV,
        value_enum,
        default_value_t = WriteModeArg::Batched
    )]
    pub write_mode: WriteModeArg,

    #[arg(
        long,
        env = COLLISION_POLICY_ENV,
        value_enum,
        default_value_t = CollisionPolicyArg::Overwrite
    )]
    pub collision_policy: CollisionPolicyArg,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,
}

impl CLI {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let max_attempts = (self.retry_attempts > 0).then_some(self.retry_attempts);
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .max_delay(Duration::from_millis(self.retry_max_delay_ms))
            .build()
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::builder()
            .keyspace(self.keyspace.clone())
            .column_family(self.corpus.clone())
            .write_mode(self.write_mode.into())
            .collision_policy(self.collision_policy.into())
            .retry(self.retry_policy())
            .build()
    }
}
