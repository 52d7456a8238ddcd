use std::sync::Arc;
use std::time::Duration;

use agora_core::{AgoraError, CallStats, Credentials, Fetcher, ParamMap};
use agora_middleware::{CachingMiddleware, FetchMiddleware, compose};
use agora_mock::{MockBehavior, MockFetcher, fixtures};
use agora_types::CacheConfig;
use serde_json::{Value, json};

fn params(value: Value) -> ParamMap {
    value.as_object().cloned().unwrap_or_default()
}

fn cached(raw: Arc<MockFetcher>, ttl: Duration) -> Arc<dyn Fetcher> {
    let config = CacheConfig {
        ttl,
        max_entries: 64,
    };
    compose(
        raw,
        vec![Box::new(CachingMiddleware::new(config)) as Box<dyn FetchMiddleware>],
    )
}

#[tokio::test]
async fn a_repeated_query_is_served_from_cache() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .fill_dates()
            .build(),
    );
    let handle = Arc::clone(&raw);
    let fetcher = cached(raw, Duration::from_secs(60));
    let query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();

    let first = CallStats::new();
    let miss = first
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap();
    assert!(!first.cache_hit());

    // If the second call reached the wire it would fail.
    handle.enqueue(MockBehavior::Fail("wire reached on a cache hit".to_string()));

    let second = CallStats::new();
    let hit = second
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap();
    assert!(second.cache_hit());
    assert_eq!(miss, hit);
}

#[tokio::test]
async fn different_parameters_use_different_entries() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .fill_dates()
            .build(),
    );
    let fetcher = cached(raw, Duration::from_secs(60));

    let acme = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();
    let zeta = fetcher
        .transform_query(&params(json!({ "symbol": "ZETA" })))
        .unwrap();

    fetcher.extract_data(&acme, &Credentials::new()).await.unwrap();

    let stats = CallStats::new();
    stats
        .scope(fetcher.extract_data(&zeta, &Credentials::new()))
        .await
        .unwrap();
    assert!(!stats.cache_hit());
}

#[tokio::test]
async fn no_cache_bypasses_lookup_and_insertion() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .fill_dates()
            .build(),
    );
    let handle = Arc::clone(&raw);
    let fetcher = cached(raw, Duration::from_secs(60));

    let mut query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();
    query.insert("no_cache".to_string(), Value::Bool(true));

    // Prime what would be the entry, then poison the wire: a bypassing call
    // must hit the wire and fail.
    fetcher.extract_data(&query, &Credentials::new()).await.unwrap();
    handle.enqueue(MockBehavior::Fail("forced".to_string()));

    let err = fetcher
        .extract_data(&query, &Credentials::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgoraError::Execution { .. }));
}

#[tokio::test]
async fn failures_are_not_cached() {
    let raw = Arc::new(
        MockFetcher::builder("EquityHistorical", "alpha")
            .rows(fixtures::history_rows())
            .fill_dates()
            .build(),
    );
    let handle = Arc::clone(&raw);
    let fetcher = cached(raw, Duration::from_secs(60));
    let query = fetcher
        .transform_query(&params(json!({ "symbol": "ACME" })))
        .unwrap();

    handle.enqueue(MockBehavior::Status {
        status: 500,
        retry_after_ms: None,
    });
    assert!(fetcher.extract_data(&query, &Credentials::new()).await.is_err());

    // The failure must not shadow a later success.
    let stats = CallStats::new();
    let payload = stats
        .scope(fetcher.extract_data(&query, &Credentials::new()))
        .await
        .unwrap();
    assert!(!stats.cache_hit());
    assert!(payload.as_array().is_some_and(|rows| !rows.is_empty()));
}
