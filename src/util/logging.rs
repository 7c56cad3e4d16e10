use tracing_subscriber::{EnvFilter, fmt};

/// Initializes tracing/logging based on environment variables.
///
/// `RUST_LOG` controls the filter; the default keeps askdb and the HTTP
/// trace layer at info.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,askdb=info,tower_http=info"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    subscriber.init();
}
