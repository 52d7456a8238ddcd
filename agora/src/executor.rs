//! The query executor: the per-call dispatch state machine.
//!
//! One call walks `resolve provider → validate support → check credentials
//! → merge params → transform_query → extract_data → transform_data →
//! envelope`. Only the wire step suspends; a configured per-call timeout
//! cancels it by dropping the in-flight future.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agora_core::interface::ModelInterface;
use agora_core::series::sort_rows;
use agora_core::{
    AgoraError, CallStats, CommandResult, Credentials, Fetcher, ParamMap, ProviderKey, Results,
    Row, Warning, WarningSink,
};
use serde_json::{Value, json};

use crate::command::Command;
use crate::context::{Application, CommandContext};

pub(crate) struct QueryExecutor<'a> {
    app: &'a Application,
    command: &'a Command,
}

impl<'a> QueryExecutor<'a> {
    pub(crate) fn new(app: &'a Application, command: &'a Command) -> Self {
        Self { app, command }
    }

    pub(crate) async fn execute(&self, mut params: ParamMap) -> Result<CommandResult, AgoraError> {
        let model = &self.command.model;
        let interface = self
            .app
            .interface()
            .get(model)
            .ok_or_else(|| AgoraError::NoProviderSelected {
                model: model.clone(),
            })?;
        let ctx = self.app.command_context();

        // Control parameters never reach schema validation.
        let explicit = params.remove("provider");
        let no_cache = match params.remove("no_cache") {
            Some(Value::Bool(flag)) => flag,
            Some(_) => {
                return Err(AgoraError::validation(
                    "parameter no_cache expects a Bool value",
                ));
            }
            None => false,
        };
        // Charting is resolved downstream of the envelope; accepted and
        // dropped here so façade signatures stay uniform.
        params.remove("chart");

        let provider = self.resolve_provider(interface, explicit, &ctx)?;
        if !interface.supports(&provider) {
            return Err(AgoraError::ModelNotSupported {
                provider,
                model: model.clone(),
            });
        }

        let fetcher = self
            .app
            .pipeline(&provider, model)
            .ok_or_else(|| AgoraError::ModelNotSupported {
                provider: provider.clone(),
                model: model.clone(),
            })?;

        let credentials = ctx.user.credentials();
        let meta = fetcher.metadata();
        if meta.requires_credentials {
            for key in &meta.credential_keys {
                if !credentials.has_non_empty(key) {
                    return Err(AgoraError::MissingCredential {
                        provider: provider.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        if let Some(note) = &self.command.deprecation {
            ctx.warnings.push(Warning::deprecation(note.clone()));
        }

        let mut merged =
            self.merge_params(interface, &provider, params, &ctx.warnings)?;
        if no_cache {
            merged.insert("no_cache".to_string(), Value::Bool(true));
        }

        let stats = CallStats::new();
        let started = Instant::now();
        let symbols = fan_out_symbols(&merged);
        // The timeout budget covers the whole call, fan-out included.
        let fut = async {
            match symbols {
                Some(symbols) => {
                    self.fan_out(Arc::clone(&fetcher), &merged, symbols, &credentials)
                        .await
                }
                None => self.fetch_one(&fetcher, &merged, &credentials).await,
            }
        };
        let outcome = match self.app.settings().preferences.request_timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), stats.scope(fut)).await {
                    Ok(result) => result,
                    Err(_) => Err(AgoraError::Timeout {
                        provider: provider.clone(),
                        model: model.clone(),
                    }),
                }
            }
            None => stats.scope(fut).await,
        };
        let runtime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let results = match outcome {
            Ok(results) => results,
            Err(AgoraError::EmptyData {
                provider: empty_provider,
                model: empty_model,
            }) if self.command.allow_empty => {
                ctx.warnings.push(Warning::provider(format!(
                    "no results found for {empty_model} via {empty_provider}"
                )));
                Results::Records(Vec::new())
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.command.path,
                    provider = %provider,
                    model = %model,
                    error = %err,
                    "command failed"
                );
                return Err(err);
            }
        };

        let mut envelope = CommandResult::new(results, provider.clone());
        envelope.warnings = ctx.warnings.drain();
        envelope
            .extra
            .insert("model".to_string(), json!(model.as_str()));
        envelope
            .extra
            .insert("fetcher_runtime_ms".to_string(), json!(runtime_ms));
        envelope
            .extra
            .insert("retries".to_string(), json!(stats.retries()));
        if stats.cache_hit() {
            envelope
                .extra
                .insert("cache_hit".to_string(), Value::Bool(true));
        }

        tracing::info!(
            path = %self.command.path,
            provider = %provider,
            model = %model,
            rows = envelope.results.len(),
            runtime_ms,
            retries = stats.retries(),
            "command served"
        );
        Ok(envelope)
    }

    /// Provider resolution chain: explicit argument, per-route default,
    /// global preference, first supporting provider alphabetically.
    fn resolve_provider(
        &self,
        interface: &ModelInterface,
        explicit: Option<Value>,
        ctx: &CommandContext,
    ) -> Result<ProviderKey, AgoraError> {
        match explicit {
            Some(Value::String(name)) => Ok(ProviderKey::new(name)),
            Some(_) => Err(AgoraError::validation(
                "parameter provider expects a String value",
            )),
            None => match ctx.user.default_provider_for(&self.command.path) {
                Some(provider) => Ok(provider),
                None => interface.first_provider().cloned().ok_or_else(|| {
                    AgoraError::NoProviderSelected {
                        model: self.command.model.clone(),
                    }
                }),
            },
        }
    }

    /// Merge and validate parameters: standard fields pass through,
    /// provider extras are kept for the chosen provider, foreign extras at
    /// their default are dropped silently, other foreign extras are dropped
    /// with a warning, and unknown names fail validation.
    fn merge_params(
        &self,
        interface: &ModelInterface,
        provider: &ProviderKey,
        params: ParamMap,
        warnings: &WarningSink,
    ) -> Result<ParamMap, AgoraError> {
        let mut merged = ParamMap::new();
        for (name, value) in params {
            if interface.standard_query.contains(&name) {
                merged.insert(name, value);
                continue;
            }
            let Some(field) = interface.extra_query.field(&name) else {
                return Err(AgoraError::validation(format!(
                    "unexpected parameter {name} for {}",
                    self.command.model
                )));
            };
            if field.default.as_ref() == Some(&value) {
                // Indistinguishable from the absent case.
                continue;
            }
            if field.providers.contains(provider) {
                merged.insert(name, value);
            } else {
                let available = field
                    .providers
                    .iter()
                    .map(ProviderKey::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                warnings.push(Warning::agora(format!(
                    "Parameter {name} is not supported by {provider}; available for: {available}. Ignoring it."
                )));
            }
        }

        interface.standard_query.validate(&merged)?;
        for field in interface.extra_query.iter() {
            if let Some(value) = merged.get(&field.name)
                && !field.accepts(value)
            {
                return Err(AgoraError::validation(format!(
                    "parameter {} expects a {:?} value",
                    field.name, field.semantic_type
                )));
            }
        }
        Ok(merged)
    }

    /// Run the three-step lifecycle once. Runs inside the call's stats
    /// scope and timeout budget, which the caller installs.
    async fn fetch_one(
        &self,
        fetcher: &Arc<dyn Fetcher>,
        params: &ParamMap,
        credentials: &Credentials,
    ) -> Result<Results, AgoraError> {
        let query = fetcher.transform_query(params)?;
        let payload = fetcher.extract_data(&query, credentials).await?;
        fetcher.transform_data(&query, payload)
    }

    /// Fan a multi-symbol query out to one fetch per symbol, then
    /// reassemble deterministic ordering. Sub-fetches share the call's
    /// stats scope and timeout budget; the concurrency gate bounds them
    /// like any other fetches.
    async fn fan_out(
        &self,
        fetcher: Arc<dyn Fetcher>,
        params: &ParamMap,
        symbols: Vec<String>,
        credentials: &Credentials,
    ) -> Result<Results, AgoraError> {
        let calls = symbols.into_iter().map(|symbol| {
            let mut sub = params.clone();
            sub.insert("symbol".to_string(), Value::String(symbol));
            let fetcher = Arc::clone(&fetcher);
            async move { self.fetch_one(&fetcher, &sub, credentials).await }
        });
        let parts = futures::future::try_join_all(calls).await?;

        let mut rows: Vec<Row> = Vec::new();
        for part in parts {
            match part {
                Results::Records(mut batch) => rows.append(&mut batch),
                Results::Record(row) => rows.push(row),
            }
        }
        sort_rows(&mut rows);
        Ok(Results::Records(rows))
    }
}

/// A comma in the `symbol` parameter declares a multi-symbol query.
fn fan_out_symbols(params: &ParamMap) -> Option<Vec<String>> {
    let raw = params.get("symbol")?.as_str()?;
    if !raw.contains(',') {
        return None;
    }
    let symbols: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    if symbols.len() > 1 { Some(symbols) } else { None }
}
