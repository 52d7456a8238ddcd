//! A scriptable fetcher whose wire step is driven by a behavior queue.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use agora_core::schema::FieldDescriptor;
use agora_core::series::sort_rows;
use agora_core::{AgoraError, Credentials, Fetcher, FetcherMetadata, ParamMap, Results, Row};
use async_trait::async_trait;
use serde_json::Value;

/// Instruction for how the next `extract_data` call should behave.
///
/// Behaviors are consumed front-to-back; once the queue is empty the fetcher
/// falls back to its fixture rows.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this raw payload.
    Payload(Value),
    /// Return an empty payload (zero rows).
    Empty,
    /// Fail with a vendor error carrying this HTTP status.
    Status {
        /// Vendor HTTP status code.
        status: u16,
        /// Optional `Retry-After` advice, in milliseconds.
        retry_after_ms: Option<u64>,
    },
    /// Fail with an unclassified execution error.
    Fail(String),
    /// Sleep before serving the fixture rows.
    Delay(Duration),
    /// Hang indefinitely (simulate a stalled vendor).
    Hang,
}

/// A deterministic fetcher backed by fixture rows and an optional behavior
/// script.
///
/// The three lifecycle steps behave like a disciplined vendor adapter:
/// `transform_query` upper-cases the symbol and fills declared defaults,
/// `extract_data` consumes the script (or serves fixtures), and
/// `transform_data` renames wire aliases, stamps the symbol, sorts rows, and
/// applies any `limit`.
pub struct MockFetcher {
    metadata: FetcherMetadata,
    rows: Vec<Row>,
    require_symbol: bool,
    fill_dates: bool,
    script: Mutex<VecDeque<MockBehavior>>,
}

impl MockFetcher {
    /// Start building a fetcher for `model` owned by `provider`.
    #[must_use]
    pub fn builder(
        model: impl Into<agora_core::ModelName>,
        provider: impl Into<agora_core::ProviderKey>,
    ) -> MockFetcherBuilder {
        MockFetcherBuilder {
            metadata: FetcherMetadata::new(model, provider),
            rows: Vec::new(),
            require_symbol: true,
            fill_dates: false,
            script: VecDeque::new(),
        }
    }

    /// Append a behavior to the script. Tests keep an `Arc<MockFetcher>`
    /// handle and enqueue behaviors between calls.
    pub fn enqueue(&self, behavior: MockBehavior) {
        match self.script.lock() {
            Ok(mut guard) => guard.push_back(behavior),
            Err(poisoned) => poisoned.into_inner().push_back(behavior),
        }
    }

    fn pop_behavior(&self) -> Option<MockBehavior> {
        match self.script.lock() {
            Ok(mut guard) => guard.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    /// Fixture rows restricted to the query's date window, if one is set.
    /// ISO dates compare correctly as strings.
    fn fixture_payload(&self, query: &ParamMap) -> Value {
        let start = query.get("start_date").and_then(Value::as_str);
        let end = query.get("end_date").and_then(Value::as_str);
        let rows: Vec<Value> = self
            .rows
            .iter()
            .filter(|row| {
                let date = row.get("date").and_then(Value::as_str);
                match date {
                    Some(d) => {
                        start.is_none_or(|s| d >= s) && end.is_none_or(|e| d <= e)
                    }
                    None => true,
                }
            })
            .cloned()
            .map(Value::Object)
            .collect();
        Value::Array(rows)
    }

    /// Rename provider wire names back to their canonical field names.
    fn unalias(&self, row: &mut Row) {
        for (canonical, wire) in &self.metadata.alias_map {
            if let Some(value) = row.remove(wire) {
                row.insert(canonical.clone(), value);
            }
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn metadata(&self) -> &FetcherMetadata {
        &self.metadata
    }

    fn transform_query(&self, params: &ParamMap) -> Result<ParamMap, AgoraError> {
        let mut query = params.clone();
        match query.get("symbol") {
            Some(Value::String(symbol)) => {
                let upper = symbol.to_uppercase();
                query.insert("symbol".to_string(), Value::String(upper));
            }
            Some(_) => {
                return Err(AgoraError::validation("field symbol expects a String value"));
            }
            None => {
                if self.require_symbol {
                    return Err(AgoraError::validation(format!(
                        "missing required field symbol for {}",
                        self.metadata.model
                    )));
                }
            }
        }
        for field in &self.metadata.extra_query {
            if let Some(default) = &field.default
                && !query.contains_key(&field.name)
            {
                query.insert(field.name.clone(), default.clone());
            }
        }
        if self.fill_dates {
            if !query.contains_key("start_date") {
                query.insert("start_date".to_string(), Value::String("2024-01-01".to_string()));
            }
            if !query.contains_key("end_date") {
                query.insert("end_date".to_string(), Value::String("2024-01-31".to_string()));
            }
        }
        Ok(query)
    }

    async fn extract_data(
        &self,
        query: &ParamMap,
        credentials: &Credentials,
    ) -> Result<Value, AgoraError> {
        if self.metadata.requires_credentials {
            for key in &self.metadata.credential_keys {
                if !credentials.has_non_empty(key) {
                    return Err(AgoraError::MissingCredential {
                        provider: self.metadata.provider.clone(),
                        key: key.clone(),
                    });
                }
            }
        }
        match self.pop_behavior() {
            None => Ok(self.fixture_payload(query)),
            Some(MockBehavior::Payload(value)) => Ok(value),
            Some(MockBehavior::Empty) => Ok(Value::Array(Vec::new())),
            Some(MockBehavior::Status {
                status,
                retry_after_ms,
            }) => Err(AgoraError::Provider {
                provider: self.metadata.provider.clone(),
                status: Some(status),
                detail: format!("vendor returned status {status}"),
                retry_after_ms,
            }),
            Some(MockBehavior::Fail(detail)) => Err(AgoraError::execution(
                self.metadata.provider.clone(),
                self.metadata.model.clone(),
                detail,
            )),
            Some(MockBehavior::Delay(pause)) => {
                tokio::time::sleep(pause).await;
                Ok(self.fixture_payload(query))
            }
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn transform_data(&self, query: &ParamMap, payload: Value) -> Result<Results, AgoraError> {
        match payload {
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(mut row) => {
                            self.unalias(&mut row);
                            rows.push(row);
                        }
                        _ => {
                            return Err(AgoraError::validation(
                                "payload rows must be JSON objects",
                            ));
                        }
                    }
                }
                if rows.is_empty() {
                    return Err(AgoraError::EmptyData {
                        provider: self.metadata.provider.clone(),
                        model: self.metadata.model.clone(),
                    });
                }
                if let Some(Value::String(symbol)) = query.get("symbol") {
                    for row in &mut rows {
                        row.entry("symbol".to_string())
                            .or_insert_with(|| Value::String(symbol.clone()));
                    }
                }
                sort_rows(&mut rows);
                if let Some(limit) = query.get("limit").and_then(Value::as_u64) {
                    rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                }
                Ok(Results::Records(rows))
            }
            Value::Object(mut row) => {
                self.unalias(&mut row);
                Ok(Results::Record(row))
            }
            _ => Err(AgoraError::validation(
                "payload must be a JSON array or object",
            )),
        }
    }
}

/// Builder for [`MockFetcher`].
pub struct MockFetcherBuilder {
    metadata: FetcherMetadata,
    rows: Vec<Row>,
    require_symbol: bool,
    fill_dates: bool,
    script: VecDeque<MockBehavior>,
}

impl MockFetcherBuilder {
    /// Set the fixture rows served when the script is exhausted.
    #[must_use]
    pub fn rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Declare a provider-only query field.
    #[must_use]
    pub fn extra_query(mut self, field: FieldDescriptor) -> Self {
        self.metadata.extra_query.push(field);
        self
    }

    /// Declare a provider-only data field.
    #[must_use]
    pub fn extra_data(mut self, field: FieldDescriptor) -> Self {
        self.metadata.extra_data.push(field);
        self
    }

    /// Map a canonical field name to the vendor wire name used in payloads.
    #[must_use]
    pub fn alias(mut self, canonical: impl Into<String>, wire: impl Into<String>) -> Self {
        self.metadata.alias_map.insert(canonical.into(), wire.into());
        self
    }

    /// Require these credential keys before any wire call.
    #[must_use]
    pub fn credentials(mut self, keys: &[&str]) -> Self {
        self.metadata.requires_credentials = true;
        self.metadata.credential_keys = keys.iter().map(ToString::to_string).collect();
        self
    }

    /// Do not require a `symbol` parameter.
    #[must_use]
    pub fn no_symbol(mut self) -> Self {
        self.require_symbol = false;
        self
    }

    /// Fill missing `start_date`/`end_date` with the fixture window.
    #[must_use]
    pub fn fill_dates(mut self) -> Self {
        self.fill_dates = true;
        self
    }

    /// Pre-load the behavior script.
    #[must_use]
    pub fn script(mut self, behaviors: Vec<MockBehavior>) -> Self {
        self.script = behaviors.into();
        self
    }

    /// Finish the fetcher.
    #[must_use]
    pub fn build(self) -> MockFetcher {
        MockFetcher {
            metadata: self.metadata,
            rows: self.rows,
            require_symbol: self.require_symbol,
            fill_dates: self.fill_dates,
            script: Mutex::new(self.script),
        }
    }
}
