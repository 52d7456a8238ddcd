use std::sync::Arc;

use agora::{AgoraError, Application, Command, ParamMap, Router, WarningCategory};
use agora_core::{Fetcher, ProviderExtension, Secret, UserSettings};
use agora_mock::{MockBehavior, MockFetcher, MockProvider, fixtures};
use agora_types::{BackoffConfig, RetryConfig};
use serde_json::{Value, json};

fn params(value: Value) -> ParamMap {
    value.as_object().cloned().unwrap_or_default()
}

fn router() -> Router {
    let price = Router::new()
        .command(Command::new("/historical/", "EquityHistorical").unwrap());
    let equity = Router::new()
        .command(Command::new("/foo/", "Foo").unwrap())
        .mount("/price", price);
    Router::new().mount("/equity", equity)
}

fn two_vendor_app() -> Application {
    Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .with_extension(Arc::new(agora_mock::alpha()) as Arc<dyn ProviderExtension>)
        .with_extension(Arc::new(agora_mock::beta()) as Arc<dyn ProviderExtension>)
        .router(router())
        .settings(UserSettings::default())
        .build()
        .unwrap()
}

#[tokio::test]
async fn foreign_extra_param_is_dropped_with_one_warning_naming_providers() {
    let app = two_vendor_app();
    let envelope = app
        .run(
            "/equity/foo/",
            params(json!({ "symbol": "X", "provider": "alpha", "limit": 2, "window": 7 })),
        )
        .await
        .unwrap();

    assert_eq!(envelope.provider.as_str(), "alpha");
    // limit=2 was honored by alpha.
    assert_eq!(envelope.results.len(), 2);

    assert_eq!(envelope.warnings.len(), 1);
    let warning = &envelope.warnings[0];
    assert_eq!(warning.category, WarningCategory::Agora);
    assert!(warning.message.contains("window"));
    assert!(warning.message.contains("alpha"));
    assert!(warning.message.contains("beta"));
}

#[tokio::test]
async fn foreign_extra_param_at_its_default_is_dropped_silently() {
    let app = two_vendor_app();
    let envelope = app
        .run(
            "/equity/foo/",
            params(json!({ "symbol": "X", "provider": "alpha", "window": 30 })),
        )
        .await
        .unwrap();
    assert!(envelope.warnings.is_empty());
}

#[tokio::test]
async fn with_no_provider_and_no_default_the_first_alphabetical_wins() {
    let app = two_vendor_app();
    let envelope = app
        .run("/equity/foo/", params(json!({ "symbol": "X" })))
        .await
        .unwrap();
    assert_eq!(envelope.provider.as_str(), "alpha");
}

#[tokio::test]
async fn route_default_provider_overrides_the_alphabetical_fallback() {
    let mut settings = UserSettings::default();
    settings
        .defaults
        .routes
        .entry("/equity/foo/".to_string())
        .or_default()
        .provider = Some("beta".to_string());

    let app = Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .with_extension(Arc::new(agora_mock::alpha()) as Arc<dyn ProviderExtension>)
        .with_extension(Arc::new(agora_mock::beta()) as Arc<dyn ProviderExtension>)
        .router(router())
        .settings(settings)
        .build()
        .unwrap();

    let envelope = app
        .run("/equity/foo/", params(json!({ "symbol": "X" })))
        .await
        .unwrap();
    assert_eq!(envelope.provider.as_str(), "beta");
}

#[tokio::test]
async fn missing_credential_is_typed_and_leaks_nothing() {
    let app = Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .with_extension(Arc::new(agora_mock::delta()) as Arc<dyn ProviderExtension>)
        .router(router())
        .settings(UserSettings::default())
        .build()
        .unwrap();

    let err = app
        .run(
            "/equity/price/historical/",
            params(json!({ "symbol": "X", "provider": "delta" })),
        )
        .await
        .unwrap_err();

    match &err {
        AgoraError::MissingCredential { provider, key } => {
            assert_eq!(provider.as_str(), "delta");
            assert_eq!(key, "delta_api_key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.error_kind(), "MissingCredential");
    assert_eq!(err.status_code(), 401);
    let detail = format!("{err}");
    assert!(!detail.contains("None"));

    // With the secret in place the call goes through, and the secret never
    // appears in the envelope's string form.
    let mut settings = UserSettings::default();
    settings
        .credentials
        .insert("delta_api_key".to_string(), Some(Secret::new("hunter2")));
    let app = Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .with_extension(Arc::new(agora_mock::delta()) as Arc<dyn ProviderExtension>)
        .router(router())
        .settings(settings)
        .build()
        .unwrap();
    let envelope = app
        .run(
            "/equity/price/historical/",
            params(json!({ "symbol": "X", "provider": "delta" })),
        )
        .await
        .unwrap();
    assert!(!format!("{envelope:?}").contains("hunter2"));
}

#[tokio::test]
async fn multi_symbol_results_interleave_by_date_then_symbol() {
    let app = two_vendor_app();
    let envelope = app
        .run(
            "/equity/price/historical/",
            params(json!({
                "symbol": "aapl,msft",
                "start_date": "2024-01-01",
                "end_date": "2024-01-03"
            })),
        )
        .await
        .unwrap();

    let keys: Vec<(String, String)> = envelope
        .results
        .rows()
        .iter()
        .map(|row| {
            (
                row.get("date").and_then(Value::as_str).unwrap().to_string(),
                row.get("symbol").and_then(Value::as_str).unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            ("2024-01-01".into(), "AAPL".into()),
            ("2024-01-01".into(), "MSFT".into()),
            ("2024-01-02".into(), "AAPL".into()),
            ("2024-01-02".into(), "MSFT".into()),
            ("2024-01-03".into(), "AAPL".into()),
            ("2024-01-03".into(), "MSFT".into()),
        ]
    );
}

#[tokio::test]
async fn two_rate_limits_then_success_surface_as_extra_retries() {
    let fetcher = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .fill_dates()
            .script(vec![
                MockBehavior::Status {
                    status: 429,
                    retry_after_ms: Some(1),
                },
                MockBehavior::Status {
                    status: 429,
                    retry_after_ms: Some(1),
                },
            ])
            .build(),
    );
    let provider = MockProvider::new("alpha")
        .with_fetcher(Arc::clone(&fetcher) as Arc<dyn Fetcher>);

    let app = Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .with_extension(Arc::new(provider) as Arc<dyn ProviderExtension>)
        .router(router())
        .settings(UserSettings::default())
        .retry_config(RetryConfig {
            max_attempts: 5,
            backoff: BackoffConfig {
                min_backoff_ms: 1,
                max_backoff_ms: 5,
                factor: 2,
                jitter_percent: 0,
            },
        })
        .build()
        .unwrap();

    let envelope = app
        .run(
            "/equity/price/historical/",
            params(json!({ "symbol": "ACME" })),
        )
        .await
        .unwrap();
    assert_eq!(envelope.extra.get("retries"), Some(&json!(2)));
    assert!(!envelope.results.is_empty());
}

#[tokio::test]
async fn a_model_with_zero_providers_cannot_resolve() {
    // Only delta is installed, and it implements EquityHistorical alone.
    let app = Application::builder()
        .schemas(agora_mock::standard_models().unwrap())
        .with_extension(Arc::new(agora_mock::delta()) as Arc<dyn ProviderExtension>)
        .router(router())
        .settings(UserSettings::default())
        .build()
        .unwrap();

    let err = app
        .run("/equity/foo/", params(json!({ "symbol": "X" })))
        .await
        .unwrap_err();
    assert!(matches!(err, AgoraError::NoProviderSelected { .. }));
    assert_eq!(err.status_code(), 400);
}
