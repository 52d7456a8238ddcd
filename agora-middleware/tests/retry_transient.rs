use std::sync::Arc;

use agora_core::{AgoraError, CallStats, Credentials, Fetcher, ParamMap};
use agora_middleware::{FetchMiddleware, RetryMiddleware, compose};
use agora_mock::{MockBehavior, MockFetcher, fixtures};
use agora_types::{BackoffConfig, RetryConfig};
use serde_json::{Value, json};

fn params(value: Value) -> ParamMap {
    value.as_object().cloned().unwrap_or_default()
}

fn fast_policy() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        backoff: BackoffConfig {
            min_backoff_ms: 1,
            max_backoff_ms: 5,
            factor: 2,
            jitter_percent: 0,
        },
    }
}

fn wrapped(raw: Arc<MockFetcher>, policy: RetryConfig) -> Arc<dyn Fetcher> {
    compose(
        raw,
        vec![Box::new(RetryMiddleware::new(policy)) as Box<dyn FetchMiddleware>],
    )
}

#[tokio::test]
async fn two_rate_limits_then_success_records_two_retries() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .fill_dates()
            .build(),
    );
    raw.enqueue(MockBehavior::Status {
        status: 429,
        retry_after_ms: Some(1),
    });
    raw.enqueue(MockBehavior::Status {
        status: 429,
        retry_after_ms: Some(1),
    });

    let fetcher = wrapped(raw, fast_policy());
    let query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();

    let stats = CallStats::new();
    let payload = stats
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap();
    assert!(payload.as_array().is_some_and(|rows| !rows.is_empty()));
    assert_eq!(stats.retries(), 2);
}

#[tokio::test]
async fn server_errors_are_retried_until_the_budget_is_spent() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .build(),
    );
    for _ in 0..5 {
        raw.enqueue(MockBehavior::Status {
            status: 503,
            retry_after_ms: None,
        });
    }

    let fetcher = wrapped(
        raw,
        RetryConfig {
            max_attempts: 3,
            ..fast_policy()
        },
    );
    let query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();

    let stats = CallStats::new();
    let err = stats
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgoraError::Provider {
            status: Some(503),
            ..
        }
    ));
    // Three attempts means two sleeps between them.
    assert_eq!(stats.retries(), 2);
}

#[tokio::test]
async fn non_transient_failures_pass_through_untouched() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .build(),
    );
    raw.enqueue(MockBehavior::Fail("bad payload shape".to_string()));

    let fetcher = wrapped(raw, fast_policy());
    let query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();

    let stats = CallStats::new();
    let err = stats
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AgoraError::Execution { .. }));
    assert_eq!(stats.retries(), 0);
}

#[tokio::test]
async fn a_vendor_4xx_is_not_retried() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .build(),
    );
    raw.enqueue(MockBehavior::Status {
        status: 404,
        retry_after_ms: None,
    });

    let fetcher = wrapped(raw, fast_policy());
    let query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();

    let stats = CallStats::new();
    let err = stats
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(stats.retries(), 0);
}
