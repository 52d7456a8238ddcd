use agora_core::secret::Secret;
use agora_core::settings::UserSettings;
use agora_types::RouteDefault;

fn sample_settings() -> UserSettings {
    let mut settings = UserSettings::default();
    settings
        .credentials
        .insert("alpha_api_key".into(), Some(Secret::new("raw-key-123")));
    settings.credentials.insert("beta_api_key".into(), None);
    settings.preferences.default_provider = Some("alpha".into());
    settings.preferences.request_timeout_ms = Some(5_000);
    settings.defaults.routes.insert(
        "/equity/foo/".into(),
        RouteDefault {
            provider: Some("beta".into()),
        },
    );
    settings
}

#[test]
fn save_then_load_roundtrips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("user_settings.json");

    let settings = sample_settings();
    assert!(settings.save(&path).expect("first save writes"));

    let loaded = UserSettings::load(&path).expect("load");
    assert_eq!(loaded, settings);
    assert_eq!(
        loaded
            .credentials
            .get("alpha_api_key")
            .and_then(|s| s.as_ref())
            .map(Secret::reveal),
        Some("raw-key-123")
    );
}

#[test]
fn unchanged_save_is_a_no_op() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("user_settings.json");

    let settings = sample_settings();
    assert!(settings.save(&path).expect("first save"));
    let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).expect("mtime");

    assert!(!settings.save(&path).expect("second save skipped"));
    let mtime_after = std::fs::metadata(&path).and_then(|m| m.modified()).expect("mtime");
    assert_eq!(mtime, mtime_after);
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let loaded = UserSettings::load(&dir.path().join("nope.json")).expect("defaults");
    assert_eq!(loaded, UserSettings::default());
}

#[test]
fn unknown_top_level_fields_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("user_settings.json");
    std::fs::write(&path, r#"{"credentials": {}, "surprise": true}"#).expect("write");

    let err = UserSettings::load(&path).expect_err("unknown field");
    assert_eq!(err.error_kind(), "ValidationError");
}

#[test]
fn persisted_file_contains_raw_secret_but_debug_does_not() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("user_settings.json");

    let settings = sample_settings();
    settings.save(&path).expect("save");

    let on_disk = std::fs::read_to_string(&path).expect("read");
    assert!(on_disk.contains("raw-key-123"), "persistence reveals secrets");

    let debugged = format!("{settings:?}");
    assert!(!debugged.contains("raw-key-123"), "debug output is redacted");
}

#[test]
fn route_default_resolution_prefers_route_over_global() {
    let settings = sample_settings();
    assert_eq!(
        settings.default_provider_for("/equity/foo/").map(|p| p.as_str().to_string()),
        Some("beta".to_string())
    );
    assert_eq!(
        settings.default_provider_for("/other/").map(|p| p.as_str().to_string()),
        Some("alpha".to_string())
    );
}
