use std::sync::Arc;

use agora_core::fetcher::{Fetcher, FetcherMetadata, ParamMap, Results};
use agora_core::provider::ProviderExtension;
use agora_core::registry::ProviderRegistry;
use agora_core::schema::{FieldDescriptor, Schema, SchemaRegistry, SemanticType, StandardModel};
use agora_core::secret::Credentials;
use agora_core::{AgoraError, ProviderInterface};
use async_trait::async_trait;
use serde_json::Value;

struct StubFetcher {
    meta: FetcherMetadata,
}

#[async_trait]
impl Fetcher for StubFetcher {
    fn metadata(&self) -> &FetcherMetadata {
        &self.meta
    }

    fn transform_query(&self, params: &ParamMap) -> Result<ParamMap, AgoraError> {
        Ok(params.clone())
    }

    async fn extract_data(
        &self,
        _query: &ParamMap,
        _credentials: &Credentials,
    ) -> Result<Value, AgoraError> {
        Ok(Value::Array(vec![]))
    }

    fn transform_data(&self, _query: &ParamMap, _payload: Value) -> Result<Results, AgoraError> {
        Ok(Results::Records(vec![]))
    }
}

struct StubProvider {
    name: &'static str,
    credentials: Vec<String>,
    fetchers: Vec<Arc<dyn Fetcher>>,
}

impl ProviderExtension for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }
    fn credentials(&self) -> Vec<String> {
        self.credentials.clone()
    }
    fn fetchers(&self) -> Vec<Arc<dyn Fetcher>> {
        self.fetchers.clone()
    }
}

fn foo_schemas() -> SchemaRegistry {
    let mut schemas = SchemaRegistry::new();
    schemas
        .register(StandardModel::new(
            "Foo",
            Schema::from_fields(vec![FieldDescriptor::new("symbol", SemanticType::String)]),
            Schema::from_fields(vec![
                FieldDescriptor::new("date", SemanticType::Date),
                FieldDescriptor::new("close", SemanticType::Float),
            ]),
        ))
        .expect("register Foo");
    schemas
}

fn provider_with_extra(
    name: &'static str,
    extra: FieldDescriptor,
) -> Arc<dyn ProviderExtension> {
    let mut meta = FetcherMetadata::new("Foo", name);
    meta.extra_query = vec![extra];
    Arc::new(StubProvider {
        name,
        credentials: vec![format!("{name}_api_key")],
        fetchers: vec![Arc::new(StubFetcher { meta })],
    })
}

fn build_interface(
    providers: Vec<Arc<dyn ProviderExtension>>,
) -> Result<ProviderInterface, AgoraError> {
    let mut builder = ProviderRegistry::builder();
    for p in providers {
        builder = builder.with_extension(p);
    }
    let registry = builder.build()?;
    ProviderInterface::build(&foo_schemas(), &registry)
}

#[test]
fn merges_extras_with_provider_origin_tags() {
    let alpha = provider_with_extra(
        "alpha",
        FieldDescriptor::new("limit", SemanticType::Int).with_default(serde_json::json!(10)),
    );
    let beta = provider_with_extra(
        "beta",
        FieldDescriptor::new("window", SemanticType::Int).with_default(serde_json::json!(30)),
    );

    let interface = build_interface(vec![alpha, beta]).expect("merge");
    let model = interface.get(&"Foo".into()).expect("Foo merged");

    assert_eq!(
        model.providers,
        vec!["alpha".into(), "beta".into()],
        "providers are sorted alphabetically"
    );
    let limit = model.extra_query.field("limit").expect("limit extra");
    assert_eq!(limit.providers, vec!["alpha".into()]);
    let window = model.extra_query.field("window").expect("window extra");
    assert_eq!(window.providers, vec!["beta".into()]);

    // Standard fields stay standard.
    assert!(model.standard_query.contains("symbol"));
    assert!(!model.extra_query.contains("symbol"));
}

#[test]
fn shared_extra_with_same_type_merges_origins() {
    let alpha = provider_with_extra("alpha", FieldDescriptor::new("limit", SemanticType::Int));
    let beta = provider_with_extra("beta", FieldDescriptor::new("limit", SemanticType::Int));

    let interface = build_interface(vec![alpha, beta]).expect("merge");
    let model = interface.get(&"Foo".into()).expect("Foo merged");
    let limit = model.extra_query.field("limit").expect("limit extra");
    assert_eq!(limit.providers, vec!["alpha".into(), "beta".into()]);
}

#[test]
fn incompatible_extra_types_conflict_naming_both_providers() {
    let alpha = provider_with_extra("alpha", FieldDescriptor::new("limit", SemanticType::Int));
    let beta = provider_with_extra("beta", FieldDescriptor::new("limit", SemanticType::String));

    let err = build_interface(vec![alpha, beta]).expect_err("conflict");
    match err {
        AgoraError::SchemaConflict {
            model,
            field,
            first,
            second,
        } => {
            assert_eq!(model.as_str(), "Foo");
            assert_eq!(field, "limit");
            assert_eq!(first.as_str(), "alpha");
            assert_eq!(second.as_str(), "beta");
        }
        other => panic!("expected SchemaConflict, got {other:?}"),
    }
}

#[test]
fn provider_may_not_redefine_standard_field_type() {
    let alpha = provider_with_extra("alpha", FieldDescriptor::new("symbol", SemanticType::Int));
    let err = build_interface(vec![alpha]).expect_err("standard redefinition");
    assert_eq!(err.error_kind(), "SchemaConflictError");
}

#[test]
fn model_without_standard_schema_is_a_registration_error() {
    let mut meta = FetcherMetadata::new("Unknown", "alpha");
    meta.extra_query = vec![];
    let provider: Arc<dyn ProviderExtension> = Arc::new(StubProvider {
        name: "alpha",
        credentials: vec![],
        fetchers: vec![Arc::new(StubFetcher { meta })],
    });

    let err = build_interface(vec![provider]).expect_err("unknown model");
    assert_eq!(err.error_kind(), "RegistrationError");
}

#[test]
fn zero_provider_models_are_absent() {
    let interface = build_interface(vec![]).expect("empty merge");
    assert!(interface.get(&"Foo".into()).is_none());
    assert!(interface.is_empty());
}

#[test]
fn credential_union_spans_providers() {
    let alpha = provider_with_extra("alpha", FieldDescriptor::new("limit", SemanticType::Int));
    let beta = provider_with_extra("beta", FieldDescriptor::new("window", SemanticType::Int));

    let interface = build_interface(vec![alpha, beta]).expect("merge");
    let keys = interface.credential_keys();
    assert_eq!(keys.get("alpha_api_key"), Some(&vec!["alpha".into()]));
    assert_eq!(keys.get("beta_api_key"), Some(&vec!["beta".into()]));
}

#[test]
fn duplicate_provider_registration_is_fatal() {
    let a1 = provider_with_extra("alpha", FieldDescriptor::new("limit", SemanticType::Int));
    let a2 = provider_with_extra("alpha", FieldDescriptor::new("limit", SemanticType::Int));

    let err = build_interface(vec![a1, a2]).expect_err("duplicate provider");
    assert_eq!(err.error_kind(), "RegistrationError");
}
