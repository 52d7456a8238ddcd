//! Deterministic fixture payloads shared by the mock fetchers.

use agora_core::Row;
use serde_json::{Value, json};

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

/// Daily OHLCV bars for one January 2024 week.
///
/// Deliberately out of date order so the transform step's sorting is
/// observable. `adjclose` is the wire name a fetcher may alias back to
/// `adj_close`.
#[must_use]
pub fn history_rows() -> Vec<Row> {
    vec![
        row(json!({
            "date": "2024-01-03",
            "open": 101.2, "high": 103.0, "low": 100.8, "close": 102.4,
            "volume": 1_180_000, "adjclose": 102.4
        })),
        row(json!({
            "date": "2024-01-01",
            "open": 100.0, "high": 101.5, "low": 99.2, "close": 101.0,
            "volume": 1_000_000, "adjclose": 101.0
        })),
        row(json!({
            "date": "2024-01-05",
            "open": 103.1, "high": 104.9, "low": 102.7, "close": 104.2,
            "volume": 1_420_000, "adjclose": 104.2
        })),
        row(json!({
            "date": "2024-01-02",
            "open": 101.0, "high": 102.2, "low": 100.1, "close": 101.2,
            "volume": 950_000, "adjclose": 101.2
        })),
        row(json!({
            "date": "2024-01-04",
            "open": 102.4, "high": 103.8, "low": 101.9, "close": 103.1,
            "volume": 1_310_000, "adjclose": 103.1
        })),
    ]
}

/// Generic single-metric rows for the `Foo` model.
#[must_use]
pub fn foo_rows() -> Vec<Row> {
    vec![
        row(json!({ "date": "2024-02-02", "value": 2.5 })),
        row(json!({ "date": "2024-02-01", "value": 1.5 })),
        row(json!({ "date": "2024-02-03", "value": 3.5 })),
    ]
}
