//! Logging setup shared by the `broker` and `client` commands.

use tracing::Level;

/// Maps a configured level name to a tracing level. Unknown names mean `info`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Installs the global fmt subscriber. Returns false if one was already
/// installed, which makes repeated calls from tests harmless.
pub fn init(level: &str) -> bool {
    tracing_subscriber::fmt()
        .compact()
        .with_max_level(parse_level(level))
        .with_target(false)
        .try_init()
        .is_ok()
}
