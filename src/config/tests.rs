use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::{Settings, load_config, load_config_from};

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.broker.id, "broker");
    assert!(settings.broker.areas_file.is_none());
    assert_eq!(settings.broker.request_suffix, "call");
    assert_eq!(settings.broker.result_suffix, "result");
    assert_eq!(settings.client.ack_timeout_ms, 5_000);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn test_partial_file_is_merged_over_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broker.toml");
    fs::write(
        &path,
        r#"
            [server]
            port = 9000

            [broker]
            id = "berlin"
            areas_file = "areas.json"

            [client]
            max_handoff_hops = 3
        "#,
    )
    .unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.id, "berlin");
    assert_eq!(cfg.broker.areas_file.as_deref(), Some("areas.json"));
    assert_eq!(cfg.broker.service_prefix, "GeoFaaS-");
    assert_eq!(cfg.client.max_handoff_hops, 3);
    assert_eq!(cfg.client.connect_timeout_ms, 5_000);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broker.toml");
    fs::write(&path, "[server]\nport = 9000\n").unwrap();

    temp_env::with_vars(
        [
            ("GEOBROKER__SERVER__PORT", Some("9100")),
            ("GEOBROKER__BROKER__ID", Some("paris")),
            ("GEOBROKER__LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config_from(&path).unwrap();
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.broker.id, "paris");
            assert_eq!(cfg.logging.level, "debug");
        },
    );
}

#[test]
#[serial]
fn test_default_location_is_relative_to_working_directory() {
    let tmp = TempDir::new().unwrap();
    let orig = env::current_dir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    fs::create_dir_all("config").unwrap();
    fs::write(
        "config/default.toml",
        "[broker]\nresult_suffix = \"answer\"\n",
    )
    .unwrap();
    let cfg = load_config();

    env::set_current_dir(orig).unwrap();
    let cfg = cfg.unwrap();
    assert_eq!(cfg.broker.result_suffix, "answer");
    assert_eq!(cfg.broker.forwarding_policy().result_suffix, "answer");
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let cfg = load_config_from(tmp.path().join("nothing-here")).unwrap();
    assert_eq!(cfg.server.port, 8080);
}
