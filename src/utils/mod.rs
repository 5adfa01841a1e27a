//! Shared utilities: error types and logging setup.

pub mod error;
pub mod logging;

pub use error::{ClientError, RegistryError};

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::logging;

    #[test]
    fn test_level_names() {
        assert_eq!(logging::parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(logging::parse_level(" warning "), Level::WARN);
        assert_eq!(logging::parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        logging::init("info");
        assert!(!logging::init("debug"));
    }
}
