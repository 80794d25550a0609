mod cli;
mod logging;
mod server;

use crate::cli::{BackendArg, CLI};
use crate::server::run_server;
use clap::Parser;
use shortn_storage::{InMemoryColumnStore, RedisConnector};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::parse();
    logging::init(config.log_format)?;

    info!(
        bind = %config.bind,
        backend = %config.backend,
        backend_addr = %config.backend_addr,
        keyspace = %config.keyspace,
        corpus = %config.corpus,
        write_mode = %config.write_mode,
        collision_policy = %config.collision_policy,
        "Starting shortn"
    );

    match config.backend {
        BackendArg::InMemory => {
            let store = InMemoryColumnStore::with_keyspace(config.keyspace.clone());
            run_server(&config, store).await?;
        }
        BackendArg::Redis => {
            let connector = RedisConnector::new(config.backend_addr.clone())?
                .with_timeout(config.backend_timeout());
            run_server(&config, connector).await?;
        }
    }

    Ok(())
}
