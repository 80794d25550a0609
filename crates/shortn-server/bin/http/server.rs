use shortn_client::{Counters, UrlStore};
use shortn_core::Connector;
use shortn_server::{App, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::cli::CLI;

/// Exit status when the backend cannot be reached at startup.
pub const EXIT_BACKEND_UNAVAILABLE: i32 = 2;

pub async fn run_server<C: Connector>(
    config: &CLI,
    connector: C,
) -> Result<(), Box<dyn std::error::Error>> {
    let counters = Arc::new(Counters::new());
    let store = match UrlStore::connect(connector, config.store_options(), counters.clone()).await
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Could not connect to backend");
            std::process::exit(EXIT_BACKEND_UNAVAILABLE);
        }
    };

    let state = AppState::new(store.clone(), counters);
    serve(config.bind, App::router(state)).await?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}

async fn serve(bind: SocketAddr, router: axum::Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(listen_addr = %listener.local_addr()?, "Serving HTTP");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
