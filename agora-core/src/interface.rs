//! The merge engine: unify every provider's schemas into the per-model
//! types consumed by the static façade builder and the HTTP surface.

use std::collections::BTreeMap;

use agora_types::{ModelName, ProviderKey};

use crate::error::AgoraError;
use crate::registry::ProviderRegistry;
use crate::schema::{Schema, SchemaRegistry};

/// Merged view of one model across every provider implementing it.
#[derive(Debug, Clone)]
pub struct ModelInterface {
    /// Model name.
    pub model: ModelName,
    /// Providers implementing this model, sorted alphabetically. The first
    /// entry is the final fallback when no default is configured.
    pub providers: Vec<ProviderKey>,
    /// The union standard query schema (canonical fields).
    pub standard_query: Schema,
    /// Provider-extra query fields, each tagged with its providers of origin.
    pub extra_query: Schema,
    /// The canonical result-row schema.
    pub standard_data: Schema,
    /// Provider-extra data fields (always optional), tagged with origin.
    pub extra_data: Schema,
}

impl ModelInterface {
    /// Whether the given provider implements this model.
    #[must_use]
    pub fn supports(&self, provider: &ProviderKey) -> bool {
        self.providers.contains(provider)
    }

    /// Default provider: first supporting provider alphabetically.
    #[must_use]
    pub fn first_provider(&self) -> Option<&ProviderKey> {
        self.providers.first()
    }
}

/// The source of truth produced by the offline merge: one [`ModelInterface`]
/// per model implemented by at least one installed provider, plus the
/// aggregated credential key union.
#[derive(Debug, Clone, Default)]
pub struct ProviderInterface {
    models: BTreeMap<ModelName, ModelInterface>,
    credential_keys: BTreeMap<String, Vec<ProviderKey>>,
}

impl ProviderInterface {
    /// Run the merge over the sealed registry.
    ///
    /// # Errors
    /// Returns `Registration` when a fetcher's model has no standard schema,
    /// and `SchemaConflict` when two providers define the same field with
    /// incompatible semantic types (or a provider redefines a standard
    /// field's type).
    pub fn build(
        schemas: &SchemaRegistry,
        registry: &ProviderRegistry,
    ) -> Result<Self, AgoraError> {
        let mut models: BTreeMap<ModelName, ModelInterface> = BTreeMap::new();

        for entry in registry.iter() {
            for (model_name, fetcher) in &entry.fetchers {
                let standard = schemas.get(model_name).ok_or_else(|| {
                    AgoraError::registration(format!(
                        "provider {} implements {model_name}, which has no standard model",
                        entry.key
                    ))
                })?;

                let merged = models.entry(model_name.clone()).or_insert_with(|| {
                    ModelInterface {
                        model: model_name.clone(),
                        providers: Vec::new(),
                        standard_query: standard.query.clone(),
                        extra_query: Schema::new(),
                        standard_data: standard.data.clone(),
                        extra_data: Schema::new(),
                    }
                });
                merged.providers.push(entry.key.clone());

                let meta = fetcher.metadata();
                for field in &meta.extra_query {
                    if let Some(standard_field) = merged.standard_query.field(&field.name) {
                        if standard_field.semantic_type != field.semantic_type {
                            return Err(AgoraError::SchemaConflict {
                                model: model_name.clone(),
                                field: field.name.clone(),
                                first: ProviderKey::new("standard"),
                                second: entry.key.clone(),
                            });
                        }
                        // Same name and type as a standard field: not an extra.
                        continue;
                    }
                    match merged.extra_query.field_mut(&field.name) {
                        Some(existing) => {
                            if existing.semantic_type != field.semantic_type {
                                let first = existing
                                    .providers
                                    .first()
                                    .cloned()
                                    .unwrap_or_else(|| ProviderKey::new("unknown"));
                                return Err(AgoraError::SchemaConflict {
                                    model: model_name.clone(),
                                    field: field.name.clone(),
                                    first,
                                    second: entry.key.clone(),
                                });
                            }
                            existing.providers.push(entry.key.clone());
                            existing.providers.sort();
                        }
                        None => {
                            let mut tagged = field.clone();
                            tagged.providers = vec![entry.key.clone()];
                            merged.extra_query.push(tagged);
                        }
                    }
                }

                for field in &meta.extra_data {
                    match merged.extra_data.field_mut(&field.name) {
                        Some(existing) => {
                            if existing.semantic_type != field.semantic_type {
                                let first = existing
                                    .providers
                                    .first()
                                    .cloned()
                                    .unwrap_or_else(|| ProviderKey::new("unknown"));
                                return Err(AgoraError::SchemaConflict {
                                    model: model_name.clone(),
                                    field: field.name.clone(),
                                    first,
                                    second: entry.key.clone(),
                                });
                            }
                            existing.providers.push(entry.key.clone());
                            existing.providers.sort();
                        }
                        None => {
                            let mut tagged = field.clone().optional();
                            tagged.providers = vec![entry.key.clone()];
                            merged.extra_data.push(tagged);
                        }
                    }
                }
            }
        }

        for merged in models.values_mut() {
            merged.providers.sort();
            merged.providers.dedup();
        }

        Ok(Self {
            models,
            credential_keys: registry.credential_union(),
        })
    }

    /// Look up the merged view of a model. Models with zero installed
    /// providers are absent.
    #[must_use]
    pub fn get(&self, model: &ModelName) -> Option<&ModelInterface> {
        self.models.get(model)
    }

    /// Iterate merged models in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelInterface> {
        self.models.values()
    }

    /// Number of merged models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no models are merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The union of credential keys across installed providers, with the
    /// providers declaring each key.
    #[must_use]
    pub fn credential_keys(&self) -> &BTreeMap<String, Vec<ProviderKey>> {
        &self.credential_keys
    }
}
