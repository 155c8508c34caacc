use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

const ALL_VARS: &[&str] = &[
    "SLUICE_PORT",
    "SLUICE_BIND_ADDR",
    "SLUICE_INSTANCES",
    "SLUICE_PRIMARY_INSTANCE",
    "SLUICE_EMBED_MODEL",
    "SLUICE_GENERATE_MODEL",
    "SLUICE_API_TOKEN",
    "SLUICE_KB_PATH",
    "SLUICE_SEARXNG_URL",
    "SLUICE_RERANK_URL",
    "SLUICE_HIGH_THRESHOLD",
    "SLUICE_LOW_THRESHOLD",
    "SLUICE_CACHE_SIMILARITY",
    "SLUICE_CACHE_CAPACITY",
    "SLUICE_CACHE_TTL_SECS",
    "SLUICE_HEALTH_INTERVAL_SECS",
    "SLUICE_FAILURE_THRESHOLD",
    "SLUICE_MAX_ATTEMPTS",
    "SLUICE_REQUEST_DEADLINE_MS",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_sluice_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in ALL_VARS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert_eq!(config.instances.len(), 1);
    assert_eq!(config.instances[0].id, "local");
    assert!(config.kb_path.is_none());
    assert!(config.searxng_url.is_none());
    assert_eq!(config.high_threshold, 0.5);
    assert_eq!(config.low_threshold, 0.15);
    assert_eq!(config.request_deadline, Duration::from_secs(60));
    assert!(config.validate().is_ok());
}

#[test]
fn test_socket_addr() {
    let config = Config {
        port: 3000,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_sluice_env();

    let config = Config::from_env().expect("should parse with defaults");
    assert_eq!(config.port, 8080);
    assert_eq!(config.instances, Config::default().instances);
    assert_eq!(config.embed_model, "nomic-embed-text");
}

#[test]
#[serial]
fn test_from_env_full() {
    clear_sluice_env();

    with_env_vars(
        &[
            ("SLUICE_PORT", "9000"),
            ("SLUICE_BIND_ADDR", "::1"),
            (
                "SLUICE_INSTANCES",
                "gpu0=http://10.0.0.1:11434, gpu1=http://10.0.0.2:11434|generation,emb=http://10.0.0.3:11434/|embedding",
            ),
            ("SLUICE_PRIMARY_INSTANCE", "gpu1"),
            ("SLUICE_API_TOKEN", "secret"),
            ("SLUICE_SEARXNG_URL", "http://searx:8888"),
            ("SLUICE_RERANK_URL", "http://tei:8080"),
            ("SLUICE_HIGH_THRESHOLD", "0.6"),
            ("SLUICE_LOW_THRESHOLD", "0.2"),
            ("SLUICE_CACHE_CAPACITY", "50"),
            ("SLUICE_FAILURE_THRESHOLD", "5"),
            ("SLUICE_REQUEST_DEADLINE_MS", "1500"),
        ],
        || {
            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.port, 9000);
            assert_eq!(
                config.bind_addr,
                IpAddr::V6(std::net::Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1))
            );
            let ids: Vec<_> = config.instances.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(ids, vec!["gpu0", "gpu1", "emb"]);
            assert_eq!(config.instances[1].kind, InstanceKind::Generation);
            assert_eq!(config.instances[2].kind, InstanceKind::Embedding);
            assert_eq!(config.primary_instance.as_deref(), Some("gpu1"));
            assert_eq!(config.api_token.as_deref(), Some("secret"));
            assert_eq!(config.searxng_url.as_deref(), Some("http://searx:8888"));
            assert_eq!(config.rerank_url.as_deref(), Some("http://tei:8080"));
            assert_eq!(config.thresholds().unwrap(), RoutingThresholds::new(0.2, 0.6).unwrap());
            assert_eq!(config.cache_config().capacity, 50);
            assert_eq!(config.registry_config().failure_threshold, 5);
            assert_eq!(config.engine_config().deadline, Duration::from_millis(1500));
            assert!(config.validate().is_ok());
        },
    );
}

#[test]
#[serial]
fn test_blank_optional_values_are_unset() {
    clear_sluice_env();

    with_env_vars(&[("SLUICE_SEARXNG_URL", "   "), ("SLUICE_API_TOKEN", "")], || {
        let config = Config::from_env().expect("should parse");
        assert!(config.searxng_url.is_none());
        assert!(config.api_token.is_none());
    });
}

#[test]
#[serial]
fn test_invalid_port_zero() {
    clear_sluice_env();

    with_env_vars(&[("SLUICE_PORT", "0")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
        assert!(err.to_string().contains("invalid port"));
    });
}

#[test]
#[serial]
fn test_invalid_port_not_number() {
    clear_sluice_env();

    with_env_vars(&[("SLUICE_PORT", "not_a_port")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::PortParseError { .. }));
    });
}

#[test]
#[serial]
fn test_invalid_bind_addr() {
    clear_sluice_env();

    with_env_vars(&[("SLUICE_BIND_ADDR", "not.an.ip.address")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
    });
}

#[test]
#[serial]
fn test_unparseable_number_is_an_error() {
    clear_sluice_env();

    with_env_vars(&[("SLUICE_CACHE_CAPACITY", "lots")], || {
        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue { name, value, .. } => {
                assert_eq!(name, "SLUICE_CACHE_CAPACITY");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    });
}

#[test]
fn test_parse_instances_rejects_malformed_entries() {
    for bad in [
        "gpu0",
        "=http://x",
        "gpu0=ftp://x",
        "gpu0=http://x|teapot",
    ] {
        assert!(
            matches!(parse_instances(bad), Err(ConfigError::InvalidInstance { .. })),
            "{bad}"
        );
    }
    assert!(matches!(parse_instances(" , "), Err(ConfigError::NoInstances)));
}

#[test]
fn test_validate_duplicate_and_unknown_primary() {
    let dup = Config {
        instances: parse_instances("a=http://x,a=http://y").unwrap(),
        ..Default::default()
    };
    assert!(matches!(dup.validate(), Err(ConfigError::DuplicateInstance { .. })));

    let unknown = Config {
        primary_instance: Some("nope".to_string()),
        ..Default::default()
    };
    assert!(matches!(unknown.validate(), Err(ConfigError::UnknownPrimary { .. })));
}

#[test]
fn test_validate_thresholds_out_of_order() {
    let config = Config {
        high_threshold: 0.1,
        low_threshold: 0.4,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_validate_kb_path() {
    let missing = Config {
        kb_path: Some(PathBuf::from("/nonexistent/kb.jsonl")),
        ..Default::default()
    };
    assert!(matches!(missing.validate(), Err(ConfigError::PathNotFound { .. })));

    let dir = Config {
        kb_path: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src")),
        ..Default::default()
    };
    assert!(matches!(dir.validate(), Err(ConfigError::NotAFile { .. })));

    let ok = Config {
        kb_path: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml")),
        ..Default::default()
    };
    assert!(ok.validate().is_ok());
}

#[test]
fn test_error_messages_are_descriptive() {
    let err = ConfigError::InvalidPort {
        value: "0".to_string(),
    };
    assert!(err.to_string().contains("1 and 65535"));

    let err = ConfigError::InvalidInstance {
        entry: "gpu0".to_string(),
        reason: "expected id=url".to_string(),
    };
    assert!(err.to_string().contains("gpu0"));
    assert!(err.to_string().contains("expected id=url"));
}
