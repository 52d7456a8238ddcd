use agora_types::{BackoffConfig, Preferences, ProvidersSnapshot, RetryConfig, RouteDefault, RouteDefaults};

#[test]
fn retry_config_roundtrip() {
    let cfg = RetryConfig {
        max_attempts: 3,
        backoff: BackoffConfig {
            min_backoff_ms: 50,
            max_backoff_ms: 2_000,
            factor: 3,
            jitter_percent: 10,
        },
    };

    let json = serde_json::to_string(&cfg).expect("serialize retry config");
    let de: RetryConfig = serde_json::from_str(&json).expect("deserialize retry config");

    assert_eq!(de.max_attempts, 3);
    assert_eq!(de.backoff.min_backoff_ms, 50);
    assert_eq!(de.backoff.factor, 3);
}

#[test]
fn backoff_delay_is_capped() {
    let backoff = BackoffConfig {
        min_backoff_ms: 100,
        max_backoff_ms: 1_000,
        factor: 10,
        jitter_percent: 0,
    };

    assert_eq!(backoff.delay_for(0).as_millis(), 100);
    assert_eq!(backoff.delay_for(1).as_millis(), 1_000);
    assert_eq!(backoff.delay_for(9).as_millis(), 1_000);
}

#[test]
fn route_defaults_read_unknown_routes_as_empty() {
    let json = r#"{"routes": {"/equity/foo/": {"provider": "beta"}}}"#;
    let defaults: RouteDefaults = serde_json::from_str(json).expect("deserialize defaults");

    assert_eq!(
        defaults.routes.get("/equity/foo/"),
        Some(&RouteDefault {
            provider: Some("beta".to_string())
        })
    );
    assert!(defaults.routes.get("/missing/").is_none());
}

#[test]
fn preferences_default_is_empty() {
    let prefs: Preferences = serde_json::from_str("{}").expect("deserialize preferences");
    assert!(prefs.default_provider.is_none());
    assert!(!prefs.cache_enabled);
}

#[test]
fn providers_snapshot_serializes_null_values() {
    let mut snap = ProvidersSnapshot::default();
    snap.add_provider("alpha", "0.1.0");
    snap.add_core("equity", "0.1.0");

    let json = serde_json::to_value(&snap).expect("serialize snapshot");
    assert_eq!(json["agora_provider_extension"]["alpha@0.1.0"], serde_json::Value::Null);
    assert_eq!(json["agora_core_extension"]["equity@0.1.0"], serde_json::Value::Null);

    let back: ProvidersSnapshot = serde_json::from_value(json).expect("deserialize snapshot");
    assert_eq!(back, snap);
}
