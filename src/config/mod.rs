mod settings;

use std::path::Path;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, ClientSettings, LoggingSettings, ServerSettings, Settings,
};

/// Environment variables look like `GEOBROKER__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "GEOBROKER";

/// Loads `config/default.*` (if present) and the environment, merged over
/// [`Settings::default`].
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Like [`load_config`] with an explicit file. The extension may be omitted,
/// a missing file is not an error.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::from(path.as_ref()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();
    let server = partial.server;
    let broker = partial.broker;
    let client = partial.client;
    let logging = partial.logging;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            id: broker
                .as_ref()
                .and_then(|b| b.id.clone())
                .unwrap_or(default.broker.id),
            areas_file: broker
                .as_ref()
                .and_then(|b| b.areas_file.clone())
                .or(default.broker.areas_file),
            request_suffix: broker
                .as_ref()
                .and_then(|b| b.request_suffix.clone())
                .unwrap_or(default.broker.request_suffix),
            result_suffix: broker
                .as_ref()
                .and_then(|b| b.result_suffix.clone())
                .unwrap_or(default.broker.result_suffix),
            service_prefix: broker
                .as_ref()
                .and_then(|b| b.service_prefix.clone())
                .unwrap_or(default.broker.service_prefix),
            root_service_prefix: broker
                .as_ref()
                .and_then(|b| b.root_service_prefix.clone())
                .unwrap_or(default.broker.root_service_prefix),
        },
        client: ClientSettings {
            connect_timeout_ms: client
                .as_ref()
                .and_then(|c| c.connect_timeout_ms)
                .unwrap_or(default.client.connect_timeout_ms),
            ack_timeout_ms: client
                .as_ref()
                .and_then(|c| c.ack_timeout_ms)
                .unwrap_or(default.client.ack_timeout_ms),
            result_timeout_ms: client
                .as_ref()
                .and_then(|c| c.result_timeout_ms)
                .unwrap_or(default.client.result_timeout_ms),
            max_handoff_hops: client
                .as_ref()
                .and_then(|c| c.max_handoff_hops)
                .unwrap_or(default.client.max_handoff_hops),
        },
        logging: LoggingSettings {
            level: logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}

#[cfg(test)]
mod tests;
