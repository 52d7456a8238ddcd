//! Command records, the nested router, and the flattened command map.

use std::collections::BTreeMap;

use agora_core::{AgoraError, ModelName};

/// One registered command: a routable path bound to a standard model.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Full command path, `/`-delimited with leading and trailing slash
    /// (e.g. `/equity/price/historical/`). Relative until flattening.
    pub path: String,
    /// The standard model this command dispatches.
    pub model: ModelName,
    /// Usage examples rendered into the generated façade.
    pub examples: Vec<String>,
    /// Deprecation note; set, the executor emits a `DeprecationWarning`.
    pub deprecation: Option<String>,
    /// Whether a zero-row vendor result is an empty envelope with a warning
    /// instead of an `EmptyData` error.
    pub allow_empty: bool,
}

impl Command {
    /// New command at `path` dispatching `model`.
    ///
    /// # Errors
    /// Returns `Registration` when the path is malformed.
    pub fn new(path: impl Into<String>, model: impl Into<ModelName>) -> Result<Self, AgoraError> {
        let path = path.into();
        validate_path(&path)?;
        Ok(Self {
            path,
            model: model.into(),
            examples: Vec::new(),
            deprecation: None,
            allow_empty: false,
        })
    }

    /// Attach a usage example.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Mark the command deprecated with a user-facing note.
    #[must_use]
    pub fn deprecated(mut self, note: impl Into<String>) -> Self {
        self.deprecation = Some(note.into());
        self
    }

    /// Relax `EmptyData` into an empty envelope plus a warning.
    #[must_use]
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }
}

/// Validate a command path: leading and trailing `/`, non-empty snake_case
/// segments.
fn validate_path(path: &str) -> Result<(), AgoraError> {
    let malformed =
        || AgoraError::registration(format!("malformed command path {path:?}"));
    if !path.starts_with('/') || !path.ends_with('/') || path.len() < 3 {
        return Err(malformed());
    }
    for segment in path[1..path.len() - 1].split('/') {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(malformed());
        }
    }
    Ok(())
}

/// Validate a mount prefix: leading `/`, no trailing `/`, snake_case
/// segments.
fn validate_prefix(prefix: &str) -> Result<(), AgoraError> {
    let malformed =
        || AgoraError::registration(format!("malformed router prefix {prefix:?}"));
    if !prefix.starts_with('/') || prefix.ends_with('/') || prefix.len() < 2 {
        return Err(malformed());
    }
    for segment in prefix[1..].split('/') {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(malformed());
        }
    }
    Ok(())
}

/// A tree of commands assembled by path prefix.
///
/// Routers nest via [`Router::mount`]; [`Router::flatten`] resolves every
/// command to its full path and rejects duplicates.
#[derive(Debug, Clone, Default)]
pub struct Router {
    commands: Vec<Command>,
    mounts: Vec<(String, Router)>,
}

impl Router {
    /// Empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command at its (prefix-relative) path.
    #[must_use]
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Mount a subrouter under a prefix (e.g. `/equity`).
    #[must_use]
    pub fn mount(mut self, prefix: impl Into<String>, router: Router) -> Self {
        self.mounts.push((prefix.into(), router));
        self
    }

    /// Flatten the tree into a path-keyed command map.
    ///
    /// # Errors
    /// Returns `Registration` on a malformed prefix or a duplicate full
    /// path.
    pub fn flatten(&self) -> Result<CommandMap, AgoraError> {
        let mut commands = BTreeMap::new();
        self.collect("", &mut commands)?;
        Ok(CommandMap { commands })
    }

    fn collect(
        &self,
        prefix: &str,
        out: &mut BTreeMap<String, Command>,
    ) -> Result<(), AgoraError> {
        for command in &self.commands {
            let mut resolved = command.clone();
            resolved.path = format!("{prefix}{}", command.path);
            if out
                .insert(resolved.path.clone(), resolved.clone())
                .is_some()
            {
                return Err(AgoraError::registration(format!(
                    "duplicate command path {}",
                    resolved.path
                )));
            }
        }
        for (mount_prefix, router) in &self.mounts {
            validate_prefix(mount_prefix)?;
            router.collect(&format!("{prefix}{mount_prefix}"), out)?;
        }
        Ok(())
    }
}

/// The flattened command map: full path to command record. Input to HTTP
/// mounting and the package builder.
#[derive(Debug, Clone, Default)]
pub struct CommandMap {
    commands: BTreeMap<String, Command>,
}

impl CommandMap {
    /// Look up a command by full path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Command> {
        self.commands.get(path)
    }

    /// Iterate commands in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Command)> {
        self.commands.iter()
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_mounts_produce_full_paths() {
        let price = Router::new()
            .command(Command::new("/historical/", "EquityHistorical").unwrap());
        let equity = Router::new()
            .command(Command::new("/foo/", "Foo").unwrap())
            .mount("/price", price);
        let root = Router::new().mount("/equity", equity);

        let map = root.flatten().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.get("/equity/foo/").is_some());
        assert_eq!(
            map.get("/equity/price/historical/").map(|c| c.model.as_str()),
            Some("EquityHistorical")
        );
    }

    #[test]
    fn duplicate_full_paths_are_fatal() {
        let router = Router::new()
            .command(Command::new("/foo/", "Foo").unwrap())
            .command(Command::new("/foo/", "Foo").unwrap());
        let err = router.flatten().unwrap_err();
        assert!(matches!(err, AgoraError::Registration { .. }));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert!(Command::new("foo/", "Foo").is_err());
        assert!(Command::new("/foo", "Foo").is_err());
        assert!(Command::new("/Foo/", "Foo").is_err());
        assert!(Command::new("//", "Foo").is_err());
        assert!(Command::new("/foo//bar/", "Foo").is_err());
        assert!(Command::new("/foo_2/bar/", "Foo").is_ok());
    }

    #[test]
    fn malformed_prefixes_are_rejected_at_flatten() {
        let inner = Router::new().command(Command::new("/foo/", "Foo").unwrap());
        let router = Router::new().mount("/equity/", inner);
        assert!(router.flatten().is_err());
    }
}
