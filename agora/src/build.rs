//! The package builder: offline generation of the typed static façade,
//! plus the `providers.json` snapshot used for drift detection.
//!
//! The merge runs once at build time and is flattened into concrete Rust
//! source: one file per top-level router segment holding typed parameter
//! structs and async command functions that wrap [`Application::run`], and
//! a `models.rs` with one typed record per merged model. Every list is
//! sorted so an unchanged platform renders byte-identical files; callers
//! embed the output with `include!` or a `mod` declaration the way
//! build-script codegen is consumed. Rebuild-on-drift compares the live
//! registry against the snapshot written by the previous build.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use agora_core::interface::ModelInterface;
use agora_core::schema::{FieldDescriptor, SemanticType};
use agora_core::{AgoraError, ProviderKey};
use agora_types::ProvidersSnapshot;

use crate::command::Command;
use crate::context::Application;

const SNAPSHOT_FILE: &str = "providers.json";
const MODELS_FILE: &str = "models.rs";
const GENERATED_HEADER: &str =
    "// @generated by agora-build from the installed provider set. Do not edit.\n";

/// Generates the typed static façade for an assembled application.
pub struct PackageBuilder<'a> {
    app: &'a Application,
}

impl<'a> PackageBuilder<'a> {
    /// New builder over the application.
    #[must_use]
    pub fn new(app: &'a Application) -> Self {
        Self { app }
    }

    /// The snapshot describing the currently installed extension set.
    #[must_use]
    pub fn snapshot(&self) -> ProvidersSnapshot {
        let mut snapshot = self.app.registry().snapshot();
        snapshot.add_core("agora", env!("CARGO_PKG_VERSION"));
        snapshot
    }

    /// Whether the build directory's snapshot differs from the installed
    /// extension set. A missing or unreadable snapshot counts as stale.
    #[must_use]
    pub fn is_stale(&self, dir: &Path) -> bool {
        let path = dir.join(SNAPSHOT_FILE);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return true;
        };
        match serde_json::from_str::<ProvidersSnapshot>(&raw) {
            Ok(written) => written != self.snapshot(),
            Err(_) => true,
        }
    }

    /// Lint the command surface: defects that do not block a build but
    /// degrade the generated façade.
    #[must_use]
    pub fn lint(&self) -> Vec<String> {
        let mut findings = Vec::new();
        for (path, command) in self.app.commands().iter() {
            if command.examples.is_empty() {
                findings.push(format!("command {path} has no usage example"));
            }
            if let Some(interface) = self.app.interface().get(&command.model) {
                for field in interface.extra_query.iter() {
                    if field.description.is_empty() {
                        findings.push(format!(
                            "parameter {} of {} has no description",
                            field.name, command.model
                        ));
                    }
                }
            }
        }
        findings
    }

    /// Generate every façade module into `dir` and write the model records
    /// and the snapshot. Files that would be byte-identical are left
    /// untouched; returns whether anything changed on disk.
    ///
    /// # Errors
    /// `Validation` on I/O failure.
    pub fn write(&self, dir: &Path) -> Result<bool, AgoraError> {
        self.write_modules(dir, &[])
    }

    /// Like [`write`](Self::write), restricted to the named top-level
    /// modules when `modules` is non-empty. The model records and the
    /// snapshot are always written in full.
    ///
    /// # Errors
    /// `Validation` on I/O failure, `Registration` when a requested module
    /// does not exist.
    pub fn write_modules(&self, dir: &Path, modules: &[String]) -> Result<bool, AgoraError> {
        let grouped = self.grouped_commands();
        for wanted in modules {
            if !grouped.contains_key(wanted.as_str()) {
                return Err(AgoraError::registration(format!(
                    "unknown façade module {wanted}"
                )));
            }
        }

        std::fs::create_dir_all(dir).map_err(|e| {
            AgoraError::validation(format!("cannot create {}: {e}", dir.display()))
        })?;

        let mut changed = false;
        for (module, commands) in &grouped {
            if !modules.is_empty() && !modules.iter().any(|m| m == module) {
                continue;
            }
            let body = self.render_module(commands);
            changed |= write_if_changed(&dir.join(format!("{module}.rs")), &body)?;
        }
        changed |= write_if_changed(&dir.join(MODELS_FILE), &self.render_models())?;

        let mut snapshot_body = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| AgoraError::validation(format!("cannot serialize snapshot: {e}")))?;
        snapshot_body.push('\n');
        changed |= write_if_changed(&dir.join(SNAPSHOT_FILE), &snapshot_body)?;

        Ok(changed)
    }

    /// Commands grouped by their first path segment.
    fn grouped_commands(&self) -> BTreeMap<String, Vec<&Command>> {
        let mut grouped: BTreeMap<String, Vec<&Command>> = BTreeMap::new();
        for (path, command) in self.app.commands().iter() {
            let module = path[1..]
                .split('/')
                .next()
                .unwrap_or("root")
                .to_string();
            grouped.entry(module).or_default().push(command);
        }
        grouped
    }

    /// One source file per top-level segment: commands at nesting depth
    /// become nested `pub mod` blocks mirroring the router tree.
    fn render_module(&self, commands: &[&Command]) -> String {
        let mut root = ModuleNode::default();
        for command in commands {
            // Segments between the top-level one and the command name.
            let segments: Vec<&str> = command.path[1..]
                .trim_end_matches('/')
                .split('/')
                .collect();
            let mut node = &mut root;
            for segment in segments.iter().skip(1).take(segments.len().saturating_sub(2)) {
                node = node.children.entry((*segment).to_string()).or_default();
            }
            node.commands.push(command);
        }

        let mut out = String::from(GENERATED_HEADER);
        self.render_node(&root, "", &mut out);
        out
    }

    fn render_node(&self, node: &ModuleNode<'_>, indent: &str, out: &mut String) {
        for command in &node.commands {
            self.render_command(command, indent, out);
        }
        for (name, child) in &node.children {
            let _ = write!(out, "\n{indent}pub mod {name} {{\n");
            self.render_node(child, &format!("{indent}    "), out);
            let _ = write!(out, "{indent}}}\n");
        }
    }

    /// One typed async function plus its parameter struct.
    fn render_command(&self, command: &Command, indent: &str, out: &mut String) {
        let Some(interface) = self.app.interface().get(&command.model) else {
            // Zero-provider commands have no callable surface.
            return;
        };
        let segments: Vec<&str> = command.path[1..].trim_end_matches('/').split('/').collect();
        let fn_name = segments[segments.len() - 1];
        let params_name = format!("{}Params", pascal_case(fn_name));
        let providers = interface
            .providers
            .iter()
            .map(ProviderKey::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let default = interface
            .first_provider()
            .map(ProviderKey::as_str)
            .unwrap_or("none");

        let _ = write!(out, "\n{indent}/// `{}` via the `{}` model.\n", command.path, command.model);
        let _ = write!(out, "{indent}///\n{indent}/// Providers: {providers} (default: {default}).\n");
        if !command.examples.is_empty() {
            let _ = write!(out, "{indent}///\n{indent}/// Examples:\n");
            for example in &command.examples {
                let _ = write!(out, "{indent}/// - `{example}`\n");
            }
        }
        if let Some(note) = &command.deprecation {
            let _ = write!(out, "{indent}#[deprecated(note = \"{}\")]\n", note.replace('"', "\\\""));
        }
        let _ = write!(out, "{indent}pub async fn {fn_name}(\n");
        let _ = write!(out, "{indent}    app: &agora::Application,\n");
        let _ = write!(out, "{indent}    params: {params_name},\n");
        let _ = write!(
            out,
            "{indent}) -> Result<agora::CommandResult, agora::AgoraError> {{\n"
        );
        let _ = write!(
            out,
            "{indent}    app.run(\"{}\", params.into_map()).await\n{indent}}}\n",
            command.path
        );

        self.render_params(interface, &params_name, fn_name, indent, out);
    }

    fn render_params(
        &self,
        interface: &ModelInterface,
        params_name: &str,
        fn_name: &str,
        indent: &str,
        out: &mut String,
    ) {
        let required: Vec<&FieldDescriptor> = interface
            .standard_query
            .iter()
            .filter(|f| !f.optional && f.default.is_none())
            .collect();
        let optional: Vec<&FieldDescriptor> = interface
            .standard_query
            .iter()
            .filter(|f| f.optional || f.default.is_some())
            .chain(interface.extra_query.iter())
            .collect();

        let _ = write!(out, "\n{indent}/// Parameters for [`{fn_name}`].\n");
        let _ = write!(out, "{indent}#[derive(Debug, Clone)]\n");
        let _ = write!(out, "{indent}pub struct {params_name} {{\n");
        for field in &required {
            render_field_doc(field, &format!("{indent}    "), out);
            let _ = write!(out, "{indent}    pub {}: {},\n", field.name, rust_type(field.semantic_type));
        }
        for field in &optional {
            render_field_doc(field, &format!("{indent}    "), out);
            let _ = write!(
                out,
                "{indent}    pub {}: Option<{}>,\n",
                field.name,
                rust_type(field.semantic_type)
            );
        }
        let _ = write!(out, "{indent}    /// Provider override; the resolution chain applies when unset.\n");
        let _ = write!(out, "{indent}    pub provider: Option<String>,\n{indent}}}\n");

        let _ = write!(out, "\n{indent}impl {params_name} {{\n");
        let _ = write!(out, "{indent}    /// Required parameters; optional ones start unset.\n");
        let _ = write!(out, "{indent}    #[must_use]\n");
        let _ = write!(out, "{indent}    pub fn new(");
        for (i, field) in required.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: {}", field.name, ctor_arg_type(field.semantic_type));
        }
        let _ = write!(out, ") -> Self {{\n{indent}        Self {{\n");
        for field in &required {
            let conv = if matches!(field.semantic_type, SemanticType::Bool | SemanticType::Int | SemanticType::Float) {
                String::new()
            } else {
                ".into()".to_string()
            };
            let _ = write!(out, "{indent}            {}: {}{conv},\n", field.name, field.name);
        }
        for field in &optional {
            let _ = write!(out, "{indent}            {}: None,\n", field.name);
        }
        let _ = write!(out, "{indent}            provider: None,\n");
        let _ = write!(out, "{indent}        }}\n{indent}    }}\n");

        let _ = write!(out, "\n{indent}    fn into_map(self) -> agora::ParamMap {{\n");
        let _ = write!(out, "{indent}        let mut map = agora::ParamMap::new();\n");
        for field in &required {
            let _ = write!(
                out,
                "{indent}        map.insert(\"{0}\".to_string(), serde_json::Value::from(self.{0}));\n",
                field.name
            );
        }
        for field in &optional {
            let _ = write!(out, "{indent}        if let Some(value) = self.{} {{\n", field.name);
            let _ = write!(
                out,
                "{indent}            map.insert(\"{}\".to_string(), serde_json::Value::from(value));\n",
                field.name
            );
            let _ = write!(out, "{indent}        }}\n");
        }
        let _ = write!(out, "{indent}        if let Some(value) = self.provider {{\n");
        let _ = write!(
            out,
            "{indent}            map.insert(\"provider\".to_string(), serde_json::Value::from(value));\n"
        );
        let _ = write!(out, "{indent}        }}\n");
        let _ = write!(out, "{indent}        map\n{indent}    }}\n{indent}}}\n");
    }

    /// One typed record per merged model, decodable from envelope rows.
    fn render_models(&self) -> String {
        let mut out = String::from(GENERATED_HEADER);
        for interface in self.app.interface().iter() {
            let name = interface.model.as_str();
            let _ = write!(out, "\n/// A `{name}` result row.\n");
            out.push_str("#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]\n");
            let _ = write!(out, "pub struct {name} {{\n");
            for field in interface.standard_data.iter().chain(interface.extra_data.iter()) {
                render_field_doc(field, "    ", &mut out);
                if field.optional {
                    out.push_str(
                        "    #[serde(default, skip_serializing_if = \"Option::is_none\")]\n",
                    );
                    let _ = write!(out, "    pub {}: Option<{}>,\n", field.name, rust_type(field.semantic_type));
                } else {
                    let _ = write!(out, "    pub {}: {},\n", field.name, rust_type(field.semantic_type));
                }
            }
            out.push_str("    /// Undeclared provider columns, passed through verbatim.\n");
            out.push_str("    #[serde(flatten)]\n");
            out.push_str("    pub extra: serde_json::Map<String, serde_json::Value>,\n}\n");

            let _ = write!(out, "\nimpl {name} {{\n");
            out.push_str("    /// Decode envelope rows into typed records.\n");
            out.push_str("    ///\n    /// # Errors\n");
            out.push_str("    /// `Validation` when a row does not match the merged data schema.\n");
            let _ = write!(
                out,
                "    pub fn from_result(result: &agora::CommandResult) -> Result<Vec<Self>, agora::AgoraError> {{\n"
            );
            out.push_str("        result\n            .results\n            .rows()\n            .iter()\n");
            out.push_str("            .map(|row| {\n");
            out.push_str("                serde_json::from_value(serde_json::Value::Object(row.clone()))\n");
            let _ = write!(
                out,
                "                    .map_err(|err| agora::AgoraError::validation(format!(\"{name} row: {{err}}\")))\n"
            );
            out.push_str("            })\n            .collect()\n    }\n}\n");
        }
        out
    }
}

/// Router subtree inside one generated file.
#[derive(Default)]
struct ModuleNode<'c> {
    children: BTreeMap<String, ModuleNode<'c>>,
    commands: Vec<&'c Command>,
}

fn render_field_doc(field: &FieldDescriptor, indent: &str, out: &mut String) {
    let mut doc = field.description.clone();
    if let Some(default) = &field.default {
        if !doc.is_empty() {
            doc.push(' ');
        }
        let _ = write!(doc, "Defaults to `{default}`.");
    }
    if !field.providers.is_empty() {
        if !doc.is_empty() {
            doc.push(' ');
        }
        let tags = field
            .providers
            .iter()
            .map(ProviderKey::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(doc, "Only for: {tags}.");
    }
    if !doc.is_empty() {
        let _ = write!(out, "{indent}/// {doc}\n");
    }
}

fn rust_type(semantic: SemanticType) -> &'static str {
    match semantic {
        SemanticType::Bool => "bool",
        SemanticType::Int => "i64",
        SemanticType::Float => "f64",
        // Dates travel as ISO strings on the wire, as does any future type.
        _ => "String",
    }
}

fn ctor_arg_type(semantic: SemanticType) -> &'static str {
    match semantic {
        SemanticType::Bool => "bool",
        SemanticType::Int => "i64",
        SemanticType::Float => "f64",
        _ => "impl Into<String>",
    }
}

fn pascal_case(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Atomic write, skipped when the target already holds `body`.
fn write_if_changed(path: &Path, body: &str) -> Result<bool, AgoraError> {
    if let Ok(existing) = std::fs::read_to_string(path)
        && existing == body
    {
        return Ok(false);
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, body.as_bytes())
        .map_err(|e| AgoraError::validation(format!("cannot write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        AgoraError::validation(format!("cannot replace {}: {e}", path.display()))
    })?;
    Ok(true)
}
