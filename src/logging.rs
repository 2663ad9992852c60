use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,teloxide=info";

/// `RUST_LOG` first, then the configured level, then [`DEFAULT_FILTER`].
pub fn init_logging(configured: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| configured.and_then(|level| EnvFilter::try_new(level.trim()).ok()))
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(env_filter).compact().init();
}
