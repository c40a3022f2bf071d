//! Query handler — answers informational questions from PKG traversals
//!
//! Each route first assembles a deterministic PKG-derived answer; when an
//! oracle is configured the structured context is rendered to natural
//! language, otherwise the structured text is returned as-is.

use repograph_core::pkg::{module_id_of_endpoint, Module};
use repograph_llm::{LlmRequest, SharedOracle};
use repograph_query::QueryEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub references: Vec<Reference>,
    pub metadata: QueryMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub modules_mentioned: Vec<String>,
    pub endpoints_mentioned: Vec<String>,
    pub query_type: String,
}

pub struct QueryHandler<'a> {
    engine: &'a QueryEngine,
    oracle: SharedOracle,
}

fn module_ref(module: &Module) -> Reference {
    Reference {
        ref_type: "module".to_string(),
        id: module.id.clone(),
        name: module.path.clone(),
    }
}

impl<'a> QueryHandler<'a> {
    pub fn new(engine: &'a QueryEngine, oracle: SharedOracle) -> Self {
        Self { engine, oracle }
    }

    pub async fn answer_query(&self, message: &str) -> QueryResponse {
        let lower = message.to_lowercase();

        let (answer, references, query_type) = if contains_any(
            &lower,
            &["entry file", "entry point", "main file", "startup file", "where is main"],
        ) {
            self.entry_file_answer(message).await
        } else if contains_any(&lower, &["app component", "root component", "main component"]) {
            self.app_component_answer(message).await
        } else if contains_any(&lower, &["feature", "features"]) {
            self.features_answer(message).await
        } else if contains_any(
            &lower,
            &["what is this project", "project about", "project summary", "describe project"],
        ) {
            self.project_summary_answer().await
        } else if contains_any(&lower, &["dependencies", "depend on", "depends on", "import"]) {
            self.dependencies_answer(message).await
        } else if contains_any(&lower, &["explain module", "what is module", "describe module"]) {
            self.module_answer(message).await
        } else if contains_any(&lower, &["list modules", "what modules", "all modules", "modules"])
        {
            self.module_list_answer()
        } else if contains_any(&lower, &["endpoint", "api", "routes"]) {
            self.endpoints_answer()
        } else {
            self.general_answer(message).await
        };

        let modules_mentioned = references
            .iter()
            .filter(|r| r.ref_type == "module")
            .map(|r| r.id.clone())
            .collect();
        let endpoints_mentioned = references
            .iter()
            .filter(|r| r.ref_type == "endpoint")
            .map(|r| r.id.clone())
            .collect();

        QueryResponse {
            answer,
            references,
            metadata: QueryMetadata {
                modules_mentioned,
                endpoints_mentioned,
                query_type,
            },
        }
    }

    /// Render structured context to natural language when the oracle is
    /// available; fall back to the structured text itself.
    async fn render(&self, question: &str, context: &str, fallback: String) -> String {
        let Some(oracle) = &self.oracle else {
            return fallback;
        };
        let prompt = format!(
            "You are a helpful assistant answering questions about a codebase. \
             Use the following project information to answer the user's question.\n\n\
             {}\n\nUser question: {}\n\n\
             Provide a clear, concise, and accurate answer based on the project \
             structure. If the question cannot be answered from the available \
             information, say so explicitly.",
            context, question
        );
        match oracle.complete(LlmRequest::new(prompt)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("query oracle unavailable, returning structured answer: {}", e);
                fallback
            }
        }
    }

    async fn entry_file_answer(&self, question: &str) -> (String, Vec<Reference>, String) {
        let entries = self.engine.entry_point_modules();
        if entries.is_empty() {
            return (
                "No entry point files found in this project. Entry points are typically \
                 files like main.ts, index.ts, app.py, or main.py."
                    .to_string(),
                Vec::new(),
                "entry_file".to_string(),
            );
        }
        let mut text = format!("Found {} entry point file(s):\n\n", entries.len());
        for module in &entries {
            text.push_str(&format!("- {}\n", module.path));
            if let Some(summary) = &module.module_summary {
                text.push_str(&format!("  {}\n", summary));
            }
        }
        let references = entries.iter().map(module_ref).collect();
        let answer = self.render(question, &text, text.clone()).await;
        (answer, references, "entry_file".to_string())
    }

    async fn app_component_answer(&self, question: &str) -> (String, Vec<Reference>, String) {
        let components = self.engine.app_component_modules();
        if components.is_empty() {
            return (
                "No app component files found in this project. App components are \
                 typically files like app.component.ts, App.tsx, or App.jsx."
                    .to_string(),
                Vec::new(),
                "app_component".to_string(),
            );
        }
        let mut text = format!("Found {} app component file(s):\n\n", components.len());
        for module in &components {
            text.push_str(&format!("- {}\n", module.path));
            if !module.exports.is_empty() {
                text.push_str(&format!("  Exports {} symbols\n", module.exports.len()));
            }
        }
        let references = components.iter().map(module_ref).collect();
        let answer = self.render(question, &text, text.clone()).await;
        (answer, references, "app_component".to_string())
    }

    async fn features_answer(&self, question: &str) -> (String, Vec<Reference>, String) {
        let features = &self.engine.pkg().features;
        if features.is_empty() {
            return (
                "No features found in this project.".to_string(),
                Vec::new(),
                "features".to_string(),
            );
        }
        let mut text = format!("Found {} feature(s):\n\n", features.len());
        let mut references = Vec::new();
        for feature in features {
            text.push_str(&format!(
                "- {} ({}) - {} modules\n",
                feature.name,
                feature.path,
                feature.module_ids.len()
            ));
            for module_id in feature.module_ids.iter().take(5) {
                if let Some(module) = self.engine.module_by_id(module_id) {
                    references.push(module_ref(module));
                }
            }
        }
        let answer = self.render(question, &text, text.clone()).await;
        (answer, references, "features".to_string())
    }

    async fn project_summary_answer(&self) -> (String, Vec<Reference>, String) {
        let pkg = self.engine.pkg();
        let project = &pkg.project;
        let mut details = Vec::new();
        if !project.languages.is_empty() {
            details.push(format!("written in {}", project.languages.join(", ")));
        }
        if !pkg.endpoints.is_empty() {
            details.push(format!("with {} API endpoints", pkg.endpoints.len()));
        }
        if !pkg.features.is_empty() {
            details.push(format!(
                "organized into {} feature areas",
                pkg.features.len()
            ));
        }
        let mut answer = format!(
            "Project {} with {} modules",
            project.name,
            pkg.modules.len()
        );
        if !details.is_empty() {
            answer.push_str(&format!(". {}.", details.join(", ")));
        }
        let references = vec![Reference {
            ref_type: "project".to_string(),
            id: project.id.clone(),
            name: project.name.clone(),
        }];
        (answer, references, "project_summary".to_string())
    }

    async fn dependencies_answer(&self, message: &str) -> (String, Vec<Reference>, String) {
        let resolved = self
            .module_from_query(message)
            .or_else(|| self.module_by_bare_name(message));
        if let Some(module_id) = resolved {
            let Some(module) = self.engine.module_by_id(&module_id).cloned() else {
                return (
                    format!("Module {} not found.", module_id),
                    Vec::new(),
                    "dependencies".to_string(),
                );
            };
            let deps = self.engine.dependencies(&module_id).await;
            let mut text = format!("Module {}:\n", module.path);
            if !deps.callees.is_empty() {
                text.push_str(&format!("\nDependencies ({}):\n", deps.callees.len()));
                for callee in deps.callees.iter().take(10) {
                    text.push_str(&format!("  - {}\n", callee.path));
                }
            } else {
                text.push_str("\nNo outgoing dependencies.\n");
            }
            if !deps.callers.is_empty() {
                text.push_str(&format!("\nUsed by ({}):\n", deps.callers.len()));
                for caller in deps.callers.iter().take(10) {
                    text.push_str(&format!("  - {}\n", caller.path));
                }
            }
            let mut references = vec![module_ref(&module)];
            references.extend(deps.callees.iter().take(10).map(module_ref));
            references.extend(deps.callers.iter().take(10).map(module_ref));
            let answer = self.render(message, &text, text.clone()).await;
            return (answer, references, "dependencies".to_string());
        }

        // Overall dependency listing: top modules by outgoing imports.
        let pkg = self.engine.pkg();
        let import_edges: Vec<_> = pkg
            .edges
            .iter()
            .filter(|e| e.edge_type == "imports")
            .collect();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for edge in &import_edges {
            if let Some(from) = module_id_of_endpoint(&edge.from) {
                *counts.entry(from).or_default() += 1;
            }
        }
        let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        let mut text = format!(
            "Project has {} modules with {} dependency relationships.\n\nTop modules by dependencies:\n",
            pkg.modules.len(),
            import_edges.len()
        );
        let mut references = Vec::new();
        for (module_id, count) in sorted.iter().take(10) {
            if let Some(module) = self.engine.module_by_id(module_id) {
                text.push_str(&format!("  - {}: {} dependencies\n", module.path, count));
                references.push(module_ref(module));
            }
        }
        let answer = self.render(message, &text, text.clone()).await;
        (answer, references, "dependencies".to_string())
    }

    async fn module_answer(&self, message: &str) -> (String, Vec<Reference>, String) {
        let Some(module_id) = self.module_from_query(message) else {
            let (answer, references, _) = (self.module_list_answer().0, Vec::new(), ());
            return (answer, references, "module_info".to_string());
        };
        let Some(module) = self.engine.module_by_id(&module_id).cloned() else {
            return (
                format!("Module {} not found.", module_id),
                Vec::new(),
                "module_info".to_string(),
            );
        };

        let mut text = format!("Module: {}\n", module.path);
        if !module.kind.is_empty() {
            text.push_str(&format!("Type: {}\n", module.kind.join(", ")));
        }
        if let Some(summary) = &module.module_summary {
            text.push_str(&format!("\nSummary: {}\n", summary));
        }
        let mut references = vec![module_ref(&module)];
        if !module.exports.is_empty() {
            text.push_str(&format!("\nExports {} symbols:\n", module.exports.len()));
            for export in module.exports.iter().take(10) {
                if let Some(symbol) = self.engine.symbol_by_id(export) {
                    text.push_str(&format!("  - {:?} {}\n", symbol.kind, symbol.name));
                    references.push(Reference {
                        ref_type: "symbol".to_string(),
                        id: symbol.id.clone(),
                        name: symbol.name.clone(),
                    });
                }
            }
        }
        let deps = self.engine.dependencies(&module_id).await;
        text.push_str(&format!(
            "\nDepends on {} modules, used by {} modules\n",
            deps.fan_out, deps.fan_in
        ));
        let answer = self.render(message, &text, text.clone()).await;
        (answer, references, "module_info".to_string())
    }

    fn module_list_answer(&self) -> (String, Vec<Reference>, String) {
        let pkg = self.engine.pkg();
        if pkg.modules.is_empty() {
            return (
                "No modules found in the project.".to_string(),
                Vec::new(),
                "module_list".to_string(),
            );
        }
        let mut by_kind: BTreeMap<String, Vec<&Module>> = BTreeMap::new();
        for module in &pkg.modules {
            let kind = module
                .kind
                .first()
                .cloned()
                .unwrap_or_else(|| "other".to_string());
            by_kind.entry(kind).or_default().push(module);
        }
        let mut text = format!("Project contains {} modules:\n\n", pkg.modules.len());
        for (kind, modules) in &by_kind {
            text.push_str(&format!("{} ({}):\n", kind.to_uppercase(), modules.len()));
            for module in modules.iter().take(20) {
                text.push_str(&format!("  - {}\n", module.path));
            }
            if modules.len() > 20 {
                text.push_str(&format!("  ... and {} more\n", modules.len() - 20));
            }
            text.push('\n');
        }
        (text, Vec::new(), "module_list".to_string())
    }

    fn endpoints_answer(&self) -> (String, Vec<Reference>, String) {
        let pkg = self.engine.pkg();
        if pkg.endpoints.is_empty() {
            return (
                "No API endpoints found in the project.".to_string(),
                Vec::new(),
                "endpoints".to_string(),
            );
        }
        let mut by_method: BTreeMap<String, Vec<&repograph_core::pkg::Endpoint>> = BTreeMap::new();
        for endpoint in &pkg.endpoints {
            by_method
                .entry(endpoint.method.clone().unwrap_or_else(|| "UNKNOWN".into()))
                .or_default()
                .push(endpoint);
        }
        let mut text = format!("Project has {} API endpoints:\n\n", pkg.endpoints.len());
        for (method, endpoints) in &by_method {
            text.push_str(&format!("{}:\n", method));
            for endpoint in endpoints.iter().take(20) {
                text.push_str(&format!("  - {}\n", endpoint.path));
            }
            text.push('\n');
        }
        let references = pkg
            .endpoints
            .iter()
            .take(20)
            .map(|e| Reference {
                ref_type: "endpoint".to_string(),
                id: e.id.clone(),
                name: format!("{} {}", e.method.as_deref().unwrap_or(""), e.path),
            })
            .collect();
        (text, references, "endpoints".to_string())
    }

    async fn general_answer(&self, message: &str) -> (String, Vec<Reference>, String) {
        let context = self.full_project_context();
        let fallback =
            "I can answer questions about the project structure, but detailed analysis \
             is unavailable without a language model."
                .to_string();
        let answer = self.render(message, &context, fallback).await;
        let references = self.references_from_answer(&answer);
        (answer, references, "general".to_string())
    }

    /// Comprehensive context for general questions: counts, entry points,
    /// features, and the highest-impact modules.
    fn full_project_context(&self) -> String {
        let pkg = self.engine.pkg();
        let mut context = format!(
            "Project: {}\nLanguages: {}\nTotal Modules: {}\nTotal Endpoints: {}\nTotal Features: {}\n",
            pkg.project.name,
            pkg.project.languages.join(", "),
            pkg.modules.len(),
            pkg.endpoints.len(),
            pkg.features.len()
        );

        let entries = self.engine.entry_point_modules();
        if !entries.is_empty() {
            context.push_str(&format!("\nEntry Points ({}):\n", entries.len()));
            for module in entries.iter().take(5) {
                context.push_str(&format!("  - {}\n", module.path));
            }
        }

        if !pkg.features.is_empty() {
            context.push_str(&format!("\nFeatures ({}):\n", pkg.features.len()));
            for feature in pkg.features.iter().take(10) {
                context.push_str(&format!(
                    "  - {} ({} modules)\n",
                    feature.name,
                    feature.module_ids.len()
                ));
            }
        }

        // High-impact modules by edge participation.
        let mut impact: BTreeMap<String, usize> = BTreeMap::new();
        for edge in &pkg.edges {
            if edge.edge_type != "imports" {
                continue;
            }
            for endpoint in [&edge.from, &edge.to] {
                if let Some(id) = module_id_of_endpoint(endpoint) {
                    *impact.entry(id).or_default() += 1;
                }
            }
        }
        let mut sorted: Vec<(String, usize)> = impact.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        if !sorted.is_empty() {
            context.push_str("\nKey Modules:\n");
            for (module_id, _) in sorted.iter().take(15) {
                if let Some(module) = self.engine.module_by_id(module_id) {
                    context.push_str(&format!(
                        "  - {} ({})\n",
                        module.path,
                        module.kind.join(", ")
                    ));
                }
            }
        }

        context
    }

    /// Try to pull a module reference out of free text: `mod:` IDs first,
    /// then filenames with a known source extension.
    fn module_from_query(&self, query: &str) -> Option<String> {
        if let Some(start) = query.find("mod:") {
            let id: String = query[start..]
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            return Some(id);
        }

        let re = regex::Regex::new(
            r"([A-Za-z0-9_./\\-]+\.(py|ts|tsx|js|jsx|java|cs|cpp|cc|c|h))\b",
        )
        .ok()?;
        let captures = re.captures(query)?;
        let path = captures[1].to_string();
        let filename = path.rsplit('/').next().unwrap_or(&path);

        let matches = self.engine.modules_by_filename(filename);
        if let Some(exact) = matches.iter().find(|m| m.path.ends_with(&path)) {
            return Some(exact.id.clone());
        }
        matches.first().map(|m| m.id.clone())
    }

    /// Bare module names without an extension ("what does B depend on")
    /// resolve when exactly one module's file stem matches the word.
    fn module_by_bare_name(&self, query: &str) -> Option<String> {
        const SKIP: &[&str] = &[
            "what", "which", "does", "do", "the", "depend", "depends", "on", "of", "is",
            "are", "module", "modules", "file", "files", "import", "imports", "uses",
        ];
        for word in query.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() || SKIP.contains(&word.as_str()) {
                continue;
            }
            let candidates: Vec<&Module> = self
                .engine
                .pkg()
                .modules
                .iter()
                .filter(|m| {
                    let base = m.path.rsplit('/').next().unwrap_or(&m.path);
                    let stem = base.split_once('.').map(|(s, _)| s).unwrap_or(base);
                    stem.to_lowercase() == word
                })
                .collect();
            if candidates.len() == 1 {
                return Some(candidates[0].id.clone());
            }
        }
        None
    }

    /// Extract module references mentioned in an oracle answer.
    fn references_from_answer(&self, answer: &str) -> Vec<Reference> {
        let Ok(re) = regex::Regex::new(r"([A-Za-z0-9_/]+\.(py|ts|tsx|js|jsx))\b") else {
            return Vec::new();
        };
        let mut references = Vec::new();
        for captures in re.captures_iter(answer).take(10) {
            let path = &captures[1];
            if let Some(module) = self
                .engine
                .pkg()
                .modules
                .iter()
                .find(|m| m.path.contains(path))
            {
                if !references
                    .iter()
                    .any(|r: &Reference| r.id == module.id)
                {
                    references.push(module_ref(module));
                }
            }
        }
        debug!("extracted {} references from answer", references.len());
        references
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::pkg::*;
    use std::sync::Arc;

    fn module(id: &str, path: &str) -> Module {
        Module {
            id: id.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    fn chain_engine() -> QueryEngine {
        let pkg = Pkg {
            version: PKG_VERSION.into(),
            generated_at: "2026-01-01T00:00:00Z".into(),
            git_sha: None,
            project: Project {
                id: "demo".into(),
                name: "demo".into(),
                root_path: "/tmp/demo".into(),
                languages: vec!["typescript".into()],
                ..Default::default()
            },
            modules: vec![
                module("mod:a.ts", "a.ts"),
                module("mod:b.ts", "b.ts"),
                module("mod:c.ts", "c.ts"),
            ],
            symbols: vec![],
            endpoints: vec![],
            edges: vec![
                Edge {
                    from: "mod:a.ts".into(),
                    to: "mod:b.ts".into(),
                    edge_type: "imports".into(),
                    weight: 1,
                },
                Edge {
                    from: "mod:b.ts".into(),
                    to: "mod:c.ts".into(),
                    edge_type: "imports".into(),
                    weight: 1,
                },
            ],
            features: vec![],
        };
        QueryEngine::new(Arc::new(pkg))
    }

    #[tokio::test]
    async fn dependency_query_references_callee() {
        // "what does B depend on" → answer mentions C as a module reference.
        let engine = chain_engine();
        let handler = QueryHandler::new(&engine, None);
        let response = handler.answer_query("what does b.ts depend on").await;

        assert_eq!(response.metadata.query_type, "dependencies");
        assert!(response
            .references
            .iter()
            .any(|r| r.ref_type == "module" && r.id == "mod:c.ts"));
        assert!(response.answer.contains("c.ts"));
        assert!(response
            .metadata
            .modules_mentioned
            .contains(&"mod:c.ts".to_string()));
    }

    #[tokio::test]
    async fn module_list_grouped() {
        let engine = chain_engine();
        let handler = QueryHandler::new(&engine, None);
        let response = handler.answer_query("list modules").await;
        assert_eq!(response.metadata.query_type, "module_list");
        assert!(response.answer.contains("3 modules"));
    }

    #[tokio::test]
    async fn endpoints_query_with_none_present() {
        let engine = chain_engine();
        let handler = QueryHandler::new(&engine, None);
        let response = handler.answer_query("what api routes exist").await;
        assert_eq!(response.metadata.query_type, "endpoints");
        assert!(response.answer.contains("No API endpoints"));
    }

    #[tokio::test]
    async fn project_summary_counts() {
        let engine = chain_engine();
        let handler = QueryHandler::new(&engine, None);
        let response = handler.answer_query("what is this project about").await;
        assert_eq!(response.metadata.query_type, "project_summary");
        assert!(response.answer.contains("3 modules"));
        assert_eq!(response.references[0].ref_type, "project");
    }
}
