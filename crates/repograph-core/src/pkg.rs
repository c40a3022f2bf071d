//! Project Knowledge Graph (PKG) data model
//!
//! All identifiers are stable, content-independent, path-based strings:
//!   module  "mod:<repo-relative-path>"
//!   symbol  "sym:<moduleId>:<qualifiedName>"
//!   feature "feat:<folder-path>"
//! so that two runs over the same tree produce comparable graphs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const PKG_VERSION: &str = "1.0.0";

/// Top-level PKG document, persisted as `pkg.json` at the repo root.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pkg {
    pub version: String,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    pub project: Project,
    pub modules: Vec<Module>,
    pub symbols: Vec<Symbol>,
    pub endpoints: Vec<Endpoint>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<Feature>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root_path: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub build_tools: Vec<String>,
    #[serde(default)]
    pub metadata: ProjectMetadata,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    #[serde(default)]
    pub framework_versions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_version: Option<String>,
    #[serde(default)]
    pub configurations: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub ui_patterns: Vec<String>,
    #[serde(default)]
    pub navigation_patterns: Vec<String>,
    #[serde(default)]
    pub code_style: CodeStyle,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indentation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naming_convention: Option<String>,
}

/// A single source file's normalized record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub kind: Vec<String>,
    pub loc: usize,
    pub hash: String,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_summary: Option<String>,
    #[serde(default)]
    pub code_patterns: CodePatterns,
    #[serde(default)]
    pub ui_elements: UiElements,
    #[serde(default)]
    pub file_structure: FileStructure,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePatterns {
    pub import_style: ImportStyle,
    pub export_style: ExportStyle,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<ComponentType>,
    #[serde(default)]
    pub lifecycle_hooks: Vec<String>,
    pub state_management: StateManagement,
}

impl Default for CodePatterns {
    fn default() -> Self {
        Self {
            import_style: ImportStyle::Mixed,
            export_style: ExportStyle::Mixed,
            decorators: Vec::new(),
            component_type: None,
            lifecycle_hooks: Vec::new(),
            state_management: StateManagement::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStyle {
    Absolute,
    Relative,
    Mixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStyle {
    Default,
    Named,
    Mixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Class,
    Function,
    Arrow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateManagement {
    Rxjs,
    Redux,
    Mobx,
    None,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UiElements {
    #[serde(default)]
    pub buttons: Vec<UiElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationPattern>,
    #[serde(default)]
    pub forms: Vec<UiElement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavigationPattern {
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStructure {
    pub has_template: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    pub has_styles: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles_path: Option<String>,
    pub is_standalone: bool,
}

/// A named top-level or class-level declaration within a module.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: String,
    pub module_id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub is_exported: bool,
    pub signature: String,
    pub visibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Interface,
}

/// A framework-detected HTTP/RPC route and its handler.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_module_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

/// A typed, directional relationship between module or symbol nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

pub mod edge_type {
    pub const IMPORTS: &str = "imports";
    pub const CALLS: &str = "calls";
    pub const EXTENDS: &str = "extends";
    pub const IMPLEMENTS: &str = "implements";
    pub const HANDLES: &str = "handles";
}

/// A folder-derived grouping of modules.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub module_ids: Vec<String>,
}

/// Given any edge endpoint string, recover the owning module ID.
/// `mod:…` is itself; `sym:mod:<path>:<name>` reconstructs `mod:<path>`.
pub fn module_id_of_endpoint(id: &str) -> Option<String> {
    if id.starts_with("mod:") {
        return Some(id.to_string());
    }
    if let Some(rest) = id.strip_prefix("sym:") {
        // rest = "mod:<path>:<name>"; the path contains no colons,
        // so split off the trailing symbol name.
        if let Some(path_and_name) = rest.strip_prefix("mod:") {
            if let Some(idx) = path_and_name.rfind(':') {
                return Some(format!("mod:{}", &path_and_name[..idx]));
            }
        }
    }
    None
}

impl Pkg {
    /// Check the structural invariants of the document:
    /// - every symbol's moduleId refers to an existing module
    /// - every edge endpoint resolves to an existing module or symbol
    /// - module.exports is a subset of that module's symbols
    /// - module.imports contains only existing module IDs
    /// - feature.moduleIds is a subset of module IDs
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        let module_ids: HashSet<&str> = self.modules.iter().map(|m| m.id.as_str()).collect();
        let symbol_ids: HashSet<&str> = self.symbols.iter().map(|s| s.id.as_str()).collect();

        for symbol in &self.symbols {
            if !module_ids.contains(symbol.module_id.as_str()) {
                problems.push(format!(
                    "symbol {} references missing module {}",
                    symbol.id, symbol.module_id
                ));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                let resolves = module_ids.contains(endpoint.as_str())
                    || symbol_ids.contains(endpoint.as_str())
                    || module_id_of_endpoint(endpoint)
                        .map(|m| module_ids.contains(m.as_str()))
                        .unwrap_or(false);
                if !resolves {
                    problems.push(format!(
                        "edge endpoint {} resolves to no module or symbol",
                        endpoint
                    ));
                }
            }
        }

        for module in &self.modules {
            let own_symbols: HashSet<&str> = self
                .symbols
                .iter()
                .filter(|s| s.module_id == module.id)
                .map(|s| s.id.as_str())
                .collect();
            for export in &module.exports {
                if !own_symbols.contains(export.as_str()) {
                    problems.push(format!(
                        "module {} exports unknown symbol {}",
                        module.id, export
                    ));
                }
            }
            for import in &module.imports {
                if !module_ids.contains(import.as_str()) {
                    problems.push(format!(
                        "module {} imports unknown module {}",
                        module.id, import
                    ));
                }
            }
        }

        for feature in &self.features {
            for module_id in &feature.module_ids {
                if !module_ids.contains(module_id.as_str()) {
                    problems.push(format!(
                        "feature {} contains unknown module {}",
                        feature.id, module_id
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_extraction() {
        assert_eq!(
            module_id_of_endpoint("mod:src/app.ts"),
            Some("mod:src/app.ts".to_string())
        );
        assert_eq!(
            module_id_of_endpoint("sym:mod:src/app.ts:AppComponent"),
            Some("mod:src/app.ts".to_string())
        );
        assert_eq!(
            module_id_of_endpoint("sym:mod:src/app.ts:AppComponent.ngOnInit"),
            Some("mod:src/app.ts".to_string())
        );
        assert_eq!(module_id_of_endpoint("feat:src"), None);
        assert_eq!(module_id_of_endpoint(""), None);
    }
}
