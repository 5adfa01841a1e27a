use serde::Deserialize;

use crate::broker::SuffixPolicy;

/// Top-level configuration settings for the application.
///
/// One file serves both roles: brokers read `server` and `broker`, clients
/// read `client`, everybody reads `logging`.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

/// Address the broker's WebSocket server binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Identity of this broker and the federation it belongs to.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub id: String,
    /// JSON file with the areas of all brokers. Without it the broker runs
    /// alone as the root of a one-broker federation.
    pub areas_file: Option<String>,
    pub request_suffix: String,
    pub result_suffix: String,
    pub service_prefix: String,
    pub root_service_prefix: String,
}

impl BrokerSettings {
    pub fn forwarding_policy(&self) -> SuffixPolicy {
        SuffixPolicy {
            request_suffix: self.request_suffix.clone(),
            result_suffix: self.result_suffix.clone(),
            service_prefix: self.service_prefix.clone(),
            root_service_prefix: self.root_service_prefix.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub connect_timeout_ms: u64,
    pub ack_timeout_ms: u64,
    pub result_timeout_ms: u64,
    pub max_handoff_hops: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub client: Option<PartialClientSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub id: Option<String>,
    pub areas_file: Option<String>,
    pub request_suffix: Option<String>,
    pub result_suffix: Option<String>,
    pub service_prefix: Option<String>,
    pub root_service_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub connect_timeout_ms: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
    pub result_timeout_ms: Option<u64>,
    pub max_handoff_hops: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            ack_timeout_ms: 5_000,
            result_timeout_ms: 10_000,
            max_handoff_hops: 8,
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        let policy = SuffixPolicy::default();
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                id: "broker".to_string(),
                areas_file: None,
                request_suffix: policy.request_suffix,
                result_suffix: policy.result_suffix,
                service_prefix: policy.service_prefix,
                root_service_prefix: policy.root_service_prefix,
            },
            client: ClientSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
