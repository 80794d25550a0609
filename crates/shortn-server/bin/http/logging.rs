use crate::cli::LogFormatArg;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init(format: LogFormatArg) -> Result<(), Box<dyn std::error::Error>> {
    LogTracer::init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = Registry::default().with(filter);

    match format {
        LogFormatArg::Text => {
            let layer = fmt::layer().with_target(true);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
        LogFormatArg::Json => {
            let layer = fmt::layer().json().with_current_span(true);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
    }
    Ok(())
}
