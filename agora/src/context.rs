//! The application context: one value constructed at startup, threaded
//! through every call. Replaces process-global singletons.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agora_core::{
    AccessorRegistry, AgoraError, CommandResult, Fetcher, ModelName, ParamMap,
    ProviderExtension, ProviderInterface, ProviderRegistry, ProviderRegistryBuilder, ProviderKey,
    SchemaRegistry, SystemSettings, UserSettings, WarningSink,
};
use agora_core::envelope::AccessorCtor;
use agora_middleware::{
    CachingMiddleware, ConcurrencyGate, ConcurrencyMiddleware, FetchMiddleware, RetryMiddleware,
    compose,
};
use agora_types::{CacheConfig, ConcurrencyConfig, RetryConfig};

use crate::build::PackageBuilder;
use crate::command::{Command, CommandMap, Router};
use crate::executor::QueryExecutor;

/// Per-call context: settings snapshots plus the call-scoped warning sink.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// User settings in effect for this call.
    pub user: UserSettings,
    /// Process settings in effect for this call.
    pub system: SystemSettings,
    /// Warning queue scoped to this call.
    pub warnings: WarningSink,
}

/// The assembled platform: sealed registry, merged interface, command map,
/// settings, and the precomposed fetch pipelines.
pub struct Application {
    registry: ProviderRegistry,
    interface: ProviderInterface,
    schemas: SchemaRegistry,
    commands: CommandMap,
    settings: UserSettings,
    system: SystemSettings,
    accessors: AccessorRegistry,
    pipelines: BTreeMap<(ProviderKey, ModelName), Arc<dyn Fetcher>>,
}

impl Application {
    /// Start building an application.
    #[must_use]
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// The sealed provider registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The merged per-model interface.
    #[must_use]
    pub fn interface(&self) -> &ProviderInterface {
        &self.interface
    }

    /// The standard-model schema registry.
    #[must_use]
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// The flattened command map.
    #[must_use]
    pub fn commands(&self) -> &CommandMap {
        &self.commands
    }

    /// User settings in effect.
    #[must_use]
    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// Process settings read from the environment at startup.
    #[must_use]
    pub fn system_settings(&self) -> &SystemSettings {
        &self.system
    }

    /// Registered envelope accessor extensions.
    #[must_use]
    pub fn accessors(&self) -> &AccessorRegistry {
        &self.accessors
    }

    /// Fresh per-call context.
    #[must_use]
    pub fn command_context(&self) -> CommandContext {
        CommandContext {
            user: self.settings.clone(),
            system: self.system.clone(),
            warnings: WarningSink::new(),
        }
    }

    /// The precomposed fetch pipeline for a provider and model.
    pub(crate) fn pipeline(
        &self,
        provider: &ProviderKey,
        model: &ModelName,
    ) -> Option<Arc<dyn Fetcher>> {
        self.pipelines
            .get(&(provider.clone(), model.clone()))
            .cloned()
    }

    /// Execute the command registered at `path`.
    ///
    /// # Errors
    /// `Validation` for an unknown path; otherwise any call-time error of
    /// the dispatch state machine.
    pub async fn run(&self, path: &str, params: ParamMap) -> Result<CommandResult, AgoraError> {
        let command = self
            .commands
            .get(path)
            .ok_or_else(|| AgoraError::validation(format!("unknown command path {path}")))?;
        self.execute(command, params).await
    }

    /// Execute a command record directly (the HTTP surface resolves paths
    /// itself).
    ///
    /// # Errors
    /// Any call-time error of the dispatch state machine.
    pub async fn execute(
        &self,
        command: &Command,
        params: ParamMap,
    ) -> Result<CommandResult, AgoraError> {
        QueryExecutor::new(self, command).execute(params).await
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("providers", &self.registry.providers())
            .field("models", &self.interface.len())
            .field("commands", &self.commands.len())
            .finish()
    }
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    schemas: SchemaRegistry,
    registry: ProviderRegistryBuilder,
    router: Router,
    settings: Option<UserSettings>,
    settings_path: Option<PathBuf>,
    accessors: AccessorRegistry,
    retry: RetryConfig,
    cache: CacheConfig,
    concurrency: ConcurrencyConfig,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    /// New builder with default policies and no providers.
    ///
    /// Behavior and trade-offs:
    /// - Starts with no schemas, providers, or commands; register at least
    ///   one of each before [`build`](Self::build) for a useful platform.
    /// - Settings default to the on-disk user settings file; use
    ///   [`settings`](Self::settings) to inject a fixed record (tests) or
    ///   [`settings_path`](Self::settings_path) for a custom location.
    /// - Retry, cache, and concurrency policies start at their documented
    ///   defaults and apply uniformly to every provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: SchemaRegistry::new(),
            registry: ProviderRegistryBuilder::new(),
            router: Router::new(),
            settings: None,
            settings_path: None,
            accessors: AccessorRegistry::new(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }

    /// Use this standard-model schema registry.
    #[must_use]
    pub fn schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    /// Register a provider extension.
    #[must_use]
    pub fn with_extension(mut self, extension: Arc<dyn ProviderExtension>) -> Self {
        self.registry = self.registry.with_extension(extension);
        self
    }

    /// Register a fallible provider extension constructor. A failure is
    /// logged and the extension skipped; startup continues.
    #[must_use]
    pub fn try_with_extension(
        mut self,
        name: &str,
        extension: Result<Arc<dyn ProviderExtension>, AgoraError>,
    ) -> Self {
        self.registry = self.registry.try_with_extension(name, extension);
        self
    }

    /// Use this command router.
    #[must_use]
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Inject a fixed settings record instead of loading from disk.
    #[must_use]
    pub fn settings(mut self, settings: UserSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Load settings from a custom path instead of the default location.
    #[must_use]
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Register an envelope accessor extension.
    #[must_use]
    pub fn with_accessor(mut self, name: &'static str, ctor: AccessorCtor) -> Self {
        self.accessors.register(name, ctor);
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub const fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the cache policy. The cache layer is only composed when
    /// `preferences.cache_enabled` is set.
    #[must_use]
    pub const fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Override the per-provider concurrency bound.
    #[must_use]
    pub const fn concurrency_config(mut self, concurrency: ConcurrencyConfig) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Seal the registry, run the merge, flatten the router, and compose
    /// the per-fetcher middleware pipelines.
    ///
    /// If `AGORA_AUTO_BUILD` is set and a build directory is configured,
    /// the static façade is rebuilt when the installed provider set drifted
    /// from the last build; a failed rebuild is logged, not fatal.
    ///
    /// # Errors
    /// `Registration` on invalid providers, routes, or commands referencing
    /// unknown models; `SchemaConflict` from the merge; `Validation` on an
    /// unreadable settings file.
    pub fn build(self) -> Result<Application, AgoraError> {
        let registry = self.registry.build()?;
        let interface = ProviderInterface::build(&self.schemas, &registry)?;
        let commands = self.router.flatten()?;
        for (path, command) in commands.iter() {
            if !self.schemas.contains(&command.model) {
                return Err(AgoraError::registration(format!(
                    "command {path} references unknown model {}",
                    command.model
                )));
            }
        }

        let settings = match self.settings {
            Some(settings) => settings,
            None => {
                let path = self
                    .settings_path
                    .unwrap_or_else(UserSettings::default_path);
                UserSettings::load(&path)?
            }
        };
        let system = SystemSettings::from_env();

        let gate = Arc::new(ConcurrencyGate::new(self.concurrency));
        let mut pipelines: BTreeMap<(ProviderKey, ModelName), Arc<dyn Fetcher>> = BTreeMap::new();
        for entry in registry.iter() {
            for (model, fetcher) in &entry.fetchers {
                let mut layers: Vec<Box<dyn FetchMiddleware>> = Vec::new();
                if settings.preferences.cache_enabled {
                    layers.push(Box::new(CachingMiddleware::new(self.cache)));
                }
                layers.push(Box::new(RetryMiddleware::new(self.retry)));
                layers.push(Box::new(ConcurrencyMiddleware::new(Arc::clone(&gate))));
                pipelines.insert(
                    (entry.key.clone(), model.clone()),
                    compose(Arc::clone(fetcher), layers),
                );
            }
        }

        let app = Application {
            registry,
            interface,
            schemas: self.schemas,
            commands,
            settings,
            system,
            accessors: self.accessors,
            pipelines,
        };

        if app.system.auto_build
            && let Some(dir) = app.settings.preferences.build_directory.clone()
        {
            let dir = Path::new(&dir);
            let builder = PackageBuilder::new(&app);
            match builder.is_stale(dir) {
                false => tracing::debug!(dir = %dir.display(), "façade build is current"),
                true => match builder.write(dir) {
                    Ok(changed) => {
                        tracing::info!(dir = %dir.display(), changed, "rebuilt static façade");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "automatic façade rebuild failed");
                    }
                },
            }
        }

        tracing::info!(
            providers = app.registry.providers().len(),
            models = app.interface.len(),
            commands = app.commands.len(),
            "application assembled"
        );
        Ok(app)
    }
}
