//! Deterministic ordering for result rows.
//!
//! Time-series results are ordered by the model's natural key:
//! `(date ascending, symbol ascending)`. Fan-out sub-tasks reassemble this
//! ordering after completion; arrival order is never surfaced.

use std::cmp::Ordering;

use serde_json::Value;

use crate::fetcher::Row;

fn key_str<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Compare two rows by `(date, symbol)`. ISO-8601 date strings order
/// correctly under lexicographic comparison; rows missing a key sort first.
#[must_use]
pub fn natural_key_cmp(a: &Row, b: &Row) -> Ordering {
    let date = key_str(a, "date").cmp(&key_str(b, "date"));
    if date != Ordering::Equal {
        return date;
    }
    key_str(a, "symbol").cmp(&key_str(b, "symbol"))
}

/// Stable-sort rows in place by the natural key.
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(natural_key_cmp);
}

/// Whether rows are already in natural-key order.
#[must_use]
pub fn is_sorted(rows: &[Row]) -> bool {
    rows.windows(2)
        .all(|w| natural_key_cmp(&w[0], &w[1]) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(date: &str, symbol: &str) -> Row {
        let Value::Object(map) = json!({"date": date, "symbol": symbol, "close": 1.0}) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn sorts_by_date_then_symbol() {
        let mut rows = vec![
            row("2020-01-02", "AAPL"),
            row("2020-01-01", "MSFT"),
            row("2020-01-01", "AAPL"),
        ];
        sort_rows(&mut rows);
        assert_eq!(key_str(&rows[0], "symbol"), Some("AAPL"));
        assert_eq!(key_str(&rows[0], "date"), Some("2020-01-01"));
        assert_eq!(key_str(&rows[1], "symbol"), Some("MSFT"));
        assert_eq!(key_str(&rows[2], "date"), Some("2020-01-02"));
        assert!(is_sorted(&rows));
    }
}
