//! Mock provider extensions with deterministic fixture data.
//!
//! Two fixture vendors, `alpha` and `beta`, implement the bundled standard
//! models with small divergences (different provider-only parameters, a wire
//! alias) so routing, schema merging, and warning behavior are all
//! observable. `delta` requires a credential. Behavior scripts on
//! [`MockFetcher`] drive failure-path tests without a network.
#![warn(missing_docs)]

mod fetcher;
/// Deterministic fixture payloads.
pub mod fixtures;

use std::sync::Arc;

use agora_core::schema::{FieldDescriptor, SemanticType};
use agora_core::{
    AgoraError, Fetcher, ProviderExtension, Schema, SchemaRegistry, StandardModel,
};
use serde_json::json;

pub use fetcher::{MockBehavior, MockFetcher, MockFetcherBuilder};

/// A provider extension assembled from mock fetchers.
pub struct MockProvider {
    name: &'static str,
    description: &'static str,
    website: &'static str,
    credentials: Vec<String>,
    fetchers: Vec<Arc<dyn Fetcher>>,
}

impl MockProvider {
    /// New provider with the given routing name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            description: "",
            website: "",
            credentials: Vec::new(),
            fetchers: Vec::new(),
        }
    }

    /// Set the vendor description.
    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the vendor website.
    #[must_use]
    pub fn website(mut self, website: &'static str) -> Self {
        self.website = website;
        self
    }

    /// Declare a credential key.
    #[must_use]
    pub fn with_credential(mut self, key: impl Into<String>) -> Self {
        self.credentials.push(key.into());
        self
    }

    /// Attach a fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetchers.push(fetcher);
        self
    }
}

impl ProviderExtension for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn website(&self) -> &'static str {
        self.website
    }

    fn credentials(&self) -> Vec<String> {
        self.credentials.clone()
    }

    fn fetchers(&self) -> Vec<Arc<dyn Fetcher>> {
        self.fetchers.clone()
    }
}

/// The standard models the mock vendors implement: a generic `Foo` metric
/// and daily `EquityHistorical` bars.
///
/// # Errors
/// Never fails in practice; the signature matches the registry contract.
pub fn standard_models() -> Result<SchemaRegistry, AgoraError> {
    let mut registry = SchemaRegistry::new();
    registry.register(StandardModel::new(
        "Foo",
        Schema::from_fields(vec![FieldDescriptor::new("symbol", SemanticType::String)]),
        Schema::from_fields(vec![
            FieldDescriptor::new("date", SemanticType::Date),
            FieldDescriptor::new("symbol", SemanticType::String).optional(),
            FieldDescriptor::new("value", SemanticType::Float)
                .describe("Arbitrary test metric."),
        ]),
    ))?;
    registry.register(StandardModel::new(
        "EquityHistorical",
        Schema::from_fields(vec![
            FieldDescriptor::new("symbol", SemanticType::String),
            FieldDescriptor::new("start_date", SemanticType::Date).optional(),
            FieldDescriptor::new("end_date", SemanticType::Date).optional(),
        ]),
        Schema::from_fields(vec![
            FieldDescriptor::new("date", SemanticType::Date),
            FieldDescriptor::new("symbol", SemanticType::String).optional(),
            FieldDescriptor::new("open", SemanticType::Float).optional(),
            FieldDescriptor::new("high", SemanticType::Float).optional(),
            FieldDescriptor::new("low", SemanticType::Float).optional(),
            FieldDescriptor::new("close", SemanticType::Float),
            FieldDescriptor::new("volume", SemanticType::Int).optional(),
        ]),
    ))?;
    Ok(registry)
}

fn history_fetcher(provider: &'static str) -> MockFetcher {
    MockFetcher::builder("EquityHistorical", provider)
        .rows(fixtures::history_rows())
        .fill_dates()
        .extra_data(
            FieldDescriptor::new("adj_close", SemanticType::Float)
                .optional()
                .describe("Dividend-adjusted close price."),
        )
        .alias("adj_close", "adjclose")
        .build()
}

/// The `alpha` vendor: `Foo` with a `limit` parameter, plus daily history.
#[must_use]
pub fn alpha() -> MockProvider {
    let foo = MockFetcher::builder("Foo", "alpha")
        .rows(fixtures::foo_rows())
        .extra_query(FieldDescriptor::new("limit", SemanticType::Int).with_default(json!(10)))
        .build();
    MockProvider::new("alpha")
        .describe("Deterministic fixture vendor.")
        .website("https://alpha.invalid")
        .with_fetcher(Arc::new(foo))
        .with_fetcher(Arc::new(history_fetcher("alpha")))
}

/// The `beta` vendor: `Foo` with a `window` parameter, plus daily history.
#[must_use]
pub fn beta() -> MockProvider {
    let foo = MockFetcher::builder("Foo", "beta")
        .rows(fixtures::foo_rows())
        .extra_query(FieldDescriptor::new("window", SemanticType::Int).with_default(json!(30)))
        .build();
    MockProvider::new("beta")
        .describe("Second fixture vendor.")
        .website("https://beta.invalid")
        .with_fetcher(Arc::new(foo))
        .with_fetcher(Arc::new(history_fetcher("beta")))
}

/// The `delta` vendor: daily history gated behind `delta_api_key`.
#[must_use]
pub fn delta() -> MockProvider {
    let history = MockFetcher::builder("EquityHistorical", "delta")
        .rows(fixtures::history_rows())
        .fill_dates()
        .credentials(&["delta_api_key"])
        .build();
    MockProvider::new("delta")
        .describe("Credentialed fixture vendor.")
        .with_credential("delta_api_key")
        .with_fetcher(Arc::new(history))
}
