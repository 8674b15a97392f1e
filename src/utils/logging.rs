use tracing::Level;

/// Map a configured level name onto a `tracing` level. Unknown names mean INFO.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Install the fmt subscriber for the process.
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal case for the second and later calls inside one test binary.
pub fn init(level: &str) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
