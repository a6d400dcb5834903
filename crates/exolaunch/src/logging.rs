use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing_subscriber` filtered by `EXOLAUNCH_LOG`, then `RUST_LOG`, then `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("EXOLAUNCH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
