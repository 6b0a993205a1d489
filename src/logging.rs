use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,error_analyzer_api=debug,tower_http=debug";

/// Initialize tracing with a compact stderr layer.
/// Default level: INFO, override via RUST_LOG env.
/// Stdout stays reserved for command output.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A subscriber may already be installed
    let _ = subscriber(env_filter, std::io::stderr).try_init();

    tracing::debug!("Tracing initialized");
}

fn subscriber<W>(env_filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(false)
        .compact();

    tracing_subscriber::registry().with(env_filter).with(layer)
}
