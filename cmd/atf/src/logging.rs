use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` when unset. Mirrors the teacher's `init_tracing`, minus the
/// file-sink/profiling-layer machinery this binary has no use for.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.parse().unwrap_or_else(|_| "info".parse().unwrap()))
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
