//! Diagram generator — architecture and dependency diagrams from the PKG
//!
//! Architecture diagrams summarize the whole graph and ask the oracle for
//! a layered graph-TD mermaid diagram; dependency diagrams (standard or
//! focused) are built directly from the PKG. Rendering goes through the
//! fallback chain in `render`.

use crate::render::render_mermaid;
use repograph_core::pkg::Module;
use repograph_core::Intent;
use repograph_llm::provider::strip_code_fences;
use repograph_llm::{LlmRequest, SharedOracle};
use repograph_query::QueryEngine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagramResponse {
    pub diagram_type: String,
    pub format: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mermaid_code: Option<String>,
    pub modules_included: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Direction filter for focused diagrams.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Both,
    Incoming,
    Outgoing,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

/// Parsed module-search request extracted from a natural-language query.
#[derive(Debug, Default)]
struct DiagramQuery {
    search_terms: Vec<String>,
    file_pattern: Option<String>,
    module_kinds: Vec<String>,
    feature_names: Vec<String>,
    direction: Option<Direction>,
}

struct GraphData {
    module_ids: Vec<String>,
    edges: Vec<(String, String, String)>,
    info: HashMap<String, (String, Vec<String>)>,
    target_modules: Vec<String>,
    direction: Direction,
    focused: bool,
}

pub struct DiagramGenerator<'a> {
    engine: &'a QueryEngine,
    oracle: SharedOracle,
}

impl<'a> DiagramGenerator<'a> {
    pub fn new(engine: &'a QueryEngine, oracle: SharedOracle) -> Self {
        Self { engine, oracle }
    }

    pub async fn generate_diagram(&self, intent: &Intent, message: &str) -> DiagramResponse {
        let lower = message.to_lowercase();

        let query = parse_diagram_query(message);
        let targets = self.find_modules_from_query(&query).await;

        let wants_architecture = lower.contains("architecture")
            || lower.contains("project")
            || lower.contains("structure");

        let depth = parse_depth(&lower).unwrap_or(2);
        let format = if lower.contains("dot") || lower.contains("graphviz") {
            "dot"
        } else if lower.contains("text") || lower.contains("ascii") {
            "text"
        } else {
            "mermaid"
        };

        if wants_architecture {
            if self.oracle.is_some() {
                match self.architecture_diagram(message).await {
                    Ok(response) => return response,
                    Err(e) => {
                        warn!("architecture diagram failed ({}), falling back to dependency", e)
                    }
                }
            } else {
                warn!("no oracle for architecture diagram, using dependency diagram");
            }
        }

        let graph = if !targets.is_empty() {
            let direction = query.direction.unwrap_or(Direction::Both);
            self.focused_graph(&targets, depth, direction).await
        } else {
            self.standard_graph(depth).await
        };

        let diagram_type = if graph.focused {
            "focused_dependency"
        } else {
            "dependency"
        };

        let (content, mermaid_code, render_meta) = match format {
            "dot" => (generate_dot(&graph), None, serde_json::json!({})),
            "text" => (generate_text_tree(&graph), None, serde_json::json!({})),
            _ => {
                let code = generate_mermaid(&graph);
                let outcome = render_mermaid(&code, 2).await;
                let meta = outcome.metadata();
                (outcome.content, Some(code), meta)
            }
        };

        let mut metadata = serde_json::json!({
            "depth": depth,
            "module_count": graph.module_ids.len(),
            "edge_count": graph.edges.len(),
        });
        merge_json(&mut metadata, render_meta);
        if graph.focused {
            metadata["is_focused"] = serde_json::json!(true);
            metadata["direction"] = serde_json::json!(graph.direction.as_str());
            metadata["target_modules"] = serde_json::json!(graph.target_modules);
        }

        DiagramResponse {
            diagram_type: diagram_type.to_string(),
            format: format.to_string(),
            content,
            mermaid_code,
            modules_included: graph.module_ids,
            metadata,
        }
    }

    // -----------------------------------------------------------------------
    // Graph construction
    // -----------------------------------------------------------------------

    async fn standard_graph(&self, _depth: usize) -> GraphData {
        let pkg = self.engine.pkg();
        let module_ids: Vec<String> = pkg.modules.iter().map(|m| m.id.clone()).collect();
        let id_set: HashSet<&String> = module_ids.iter().collect();

        let mut edges = Vec::new();
        for edge in &pkg.edges {
            if edge.edge_type != "imports" && edge.edge_type != "calls" {
                continue;
            }
            let (Some(from), Some(to)) = (
                repograph_core::pkg::module_id_of_endpoint(&edge.from),
                repograph_core::pkg::module_id_of_endpoint(&edge.to),
            ) else {
                continue;
            };
            if from != to && id_set.contains(&from) && id_set.contains(&to) {
                edges.push((from, to, edge.edge_type.clone()));
            }
        }
        edges.dedup();

        let info = module_ids
            .iter()
            .filter_map(|id| {
                self.engine
                    .module_by_id(id)
                    .map(|m| (id.clone(), (m.path.clone(), m.kind.clone())))
            })
            .collect();

        GraphData {
            module_ids,
            edges,
            info,
            target_modules: Vec::new(),
            direction: Direction::Both,
            focused: false,
        }
    }

    /// Focused graph: seed modules expanded by depth with a direction filter.
    async fn focused_graph(
        &self,
        targets: &[Module],
        depth: usize,
        direction: Direction,
    ) -> GraphData {
        let target_ids: Vec<String> = targets.iter().map(|m| m.id.clone()).collect();
        let mut included: HashSet<String> = target_ids.iter().cloned().collect();
        let mut edges: Vec<(String, String, String)> = Vec::new();
        let mut edge_set: HashSet<(String, String)> = HashSet::new();

        for target in &target_ids {
            let deps = self.engine.dependencies(target).await;
            if matches!(direction, Direction::Both | Direction::Incoming) {
                for caller in &deps.callers {
                    included.insert(caller.id.clone());
                    if edge_set.insert((caller.id.clone(), target.clone())) {
                        edges.push((caller.id.clone(), target.clone(), "calls".to_string()));
                    }
                }
            }
            if matches!(direction, Direction::Both | Direction::Outgoing) {
                for callee in &deps.callees {
                    included.insert(callee.id.clone());
                    if edge_set.insert((target.clone(), callee.id.clone())) {
                        edges.push((target.clone(), callee.id.clone(), "imports".to_string()));
                    }
                }
            }
        }

        // Expand by the remaining depth, then pull in edges between any
        // included pair.
        if depth > 1 {
            let seeds: Vec<String> = included.iter().cloned().collect();
            let impact = self.engine.impacted_modules(&seeds, depth - 1).await;
            included.extend(impact.module_ids);

            for edge in &self.engine.pkg().edges {
                if edge.edge_type != "imports" && edge.edge_type != "calls" {
                    continue;
                }
                let (Some(from), Some(to)) = (
                    repograph_core::pkg::module_id_of_endpoint(&edge.from),
                    repograph_core::pkg::module_id_of_endpoint(&edge.to),
                ) else {
                    continue;
                };
                if from != to
                    && included.contains(&from)
                    && included.contains(&to)
                    && edge_set.insert((from.clone(), to.clone()))
                {
                    edges.push((from, to, edge.edge_type.clone()));
                }
            }
        }

        let mut module_ids: Vec<String> = included.into_iter().collect();
        module_ids.sort();
        let info = module_ids
            .iter()
            .filter_map(|id| {
                self.engine
                    .module_by_id(id)
                    .map(|m| (id.clone(), (m.path.clone(), m.kind.clone())))
            })
            .collect();

        GraphData {
            module_ids,
            edges,
            info,
            target_modules: target_ids,
            direction,
            focused: true,
        }
    }

    // -----------------------------------------------------------------------
    // Module discovery from natural language
    // -----------------------------------------------------------------------

    /// Multi-strategy module search with integer confidences:
    /// filename 100, kind 80, path 60, feature 50, tag 40, symbol 30.
    async fn find_modules_from_query(&self, query: &DiagramQuery) -> Vec<Module> {
        let mut found: Vec<(Module, u32)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let add = |module: Module, confidence: u32, found: &mut Vec<(Module, u32)>, seen: &mut HashSet<String>| {
            if seen.insert(module.id.clone()) {
                found.push((module, confidence));
            }
        };

        if let Some(pattern) = &query.file_pattern {
            for module in self.engine.modules_by_filename(pattern) {
                add(module, 100, &mut found, &mut seen);
            }
        }

        for kind in &query.module_kinds {
            let mut modules = self.engine.modules_by_kind(kind);
            if !query.search_terms.is_empty() {
                modules.retain(|m| {
                    query.search_terms.iter().any(|term| {
                        m.path.to_lowercase().contains(&term.to_lowercase())
                            || m.id.to_lowercase().contains(&term.to_lowercase())
                    })
                });
            }
            for module in modules {
                add(module, 80, &mut found, &mut seen);
            }
        }

        for term in &query.search_terms {
            for module in self.engine.modules_by_path_pattern(&format!("*{}*", term)) {
                add(module, 60, &mut found, &mut seen);
            }
        }

        for feature in &query.feature_names {
            for module in self
                .engine
                .modules_by_path_pattern(&format!("*{}*", feature))
            {
                add(module, 50, &mut found, &mut seen);
            }
        }

        for term in &query.search_terms {
            if query.module_kinds.contains(term) {
                continue;
            }
            for module in self.engine.modules_by_tag(term).await {
                add(module, 40, &mut found, &mut seen);
            }
        }

        for term in &query.search_terms {
            for symbol in self.engine.symbols_by_name(&format!("*{}*", term)) {
                if let Some(module) = self.engine.module_by_id(&symbol.module_id) {
                    add(module.clone(), 30, &mut found, &mut seen);
                }
            }
        }

        found.sort_by(|a, b| b.1.cmp(&a.1));
        debug!("diagram query matched {} modules", found.len());
        found.into_iter().map(|(module, _)| module).collect()
    }

    // -----------------------------------------------------------------------
    // Architecture diagram
    // -----------------------------------------------------------------------

    async fn architecture_diagram(
        &self,
        message: &str,
    ) -> Result<DiagramResponse, repograph_core::Error> {
        let oracle = self
            .oracle
            .as_ref()
            .ok_or_else(|| repograph_core::Error::Internal("no oracle".into()))?;

        let pkg = self.engine.pkg();

        let mut modules_by_kind: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for module in &pkg.modules {
            let kind = module
                .kind
                .first()
                .cloned()
                .unwrap_or_else(|| "other".to_string());
            modules_by_kind.entry(kind).or_default().push(module.path.clone());
        }
        for paths in modules_by_kind.values_mut() {
            paths.truncate(10);
        }

        let entry_points: Vec<String> = self
            .engine
            .entry_point_modules()
            .iter()
            .map(|m| m.path.clone())
            .collect();

        // Critical modules: top fan-in, computed in memory.
        let mut fan_in: BTreeMap<String, usize> = BTreeMap::new();
        for edge in &pkg.edges {
            if edge.edge_type != "imports" && edge.edge_type != "calls" {
                continue;
            }
            if let Some(to) = repograph_core::pkg::module_id_of_endpoint(&edge.to) {
                *fan_in.entry(to).or_default() += 1;
            }
        }
        let mut critical: Vec<(String, usize)> = fan_in
            .into_iter()
            .filter_map(|(id, count)| {
                self.engine.module_by_id(&id).map(|m| (m.path.clone(), count))
            })
            .collect();
        critical.sort_by(|a, b| b.1.cmp(&a.1));
        critical.truncate(10);

        let mut edge_counts: BTreeMap<String, usize> = BTreeMap::new();
        for edge in &pkg.edges {
            *edge_counts.entry(edge.edge_type.clone()).or_default() += 1;
        }

        let feature_names: Vec<String> =
            pkg.features.iter().take(10).map(|f| f.name.clone()).collect();

        let prompt = format!(
            "You are an expert software architect. Analyze the codebase structure and \
             generate a comprehensive Mermaid architecture diagram.\n\n\
             Codebase Summary:\n\
             - Total Modules: {}\n\
             - Modules by Kind:\n{}\n\
             - Entry Points: {:?}\n\
             - Critical Modules (High Fan-in): {:?}\n\
             - Dependency Patterns: {:?}\n\
             - Features: {:?}\n\n\
             User Request: {}\n\n\
             Generate a Mermaid architecture diagram (graph TD format) that shows:\n\
             1. High-level architectural layers (Controllers, Services, Data Access, ...)\n\
             2. Key modules in each layer (most important only)\n\
             3. Relationships and data flow between layers\n\
             4. Entry points and critical modules\n\n\
             Requirements: use Mermaid graph TD syntax, group related modules into \
             subgraphs, keep the diagram readable (~20-30 key modules).\n\
             Return ONLY the Mermaid code, no explanations or markdown formatting.",
            pkg.modules.len(),
            serde_json::to_string_pretty(&modules_by_kind).unwrap_or_default(),
            entry_points,
            critical,
            edge_counts,
            feature_names,
            message,
        );

        let response = oracle
            .complete(LlmRequest::new(prompt).with_temperature(0.3))
            .await
            .map_err(|e| repograph_core::Error::llm("diagram", e.to_string()))?;

        let mut mermaid_code = strip_code_fences(&response);
        if !mermaid_code.trim_start().starts_with("graph")
            && !mermaid_code.trim_start().starts_with("flowchart")
        {
            mermaid_code = format!("graph TD\n{}", mermaid_code);
        }

        let outcome = render_mermaid(&mermaid_code, 2).await;
        let mut metadata = serde_json::json!({ "generated_by": "llm" });
        merge_json(&mut metadata, outcome.metadata());

        Ok(DiagramResponse {
            diagram_type: "architecture".to_string(),
            format: "mermaid".to_string(),
            content: outcome.content,
            mermaid_code: Some(mermaid_code),
            modules_included: Vec::new(),
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// Query parsing
// ---------------------------------------------------------------------------

const KIND_KEYWORDS: &[(&str, &[&str])] = &[
    ("service", &["service", "services"]),
    ("controller", &["controller", "controllers"]),
    ("component", &["component", "components"]),
    ("entity", &["entity", "entities", "model", "models"]),
    ("repository", &["repository", "repositories", "repo", "repos"]),
    ("module", &["modules"]),
    ("util", &["util", "utils", "utility", "helper", "helpers"]),
];

const FEATURE_KEYWORDS: &[&str] = &[
    "login", "auth", "authentication", "user", "payment", "order", "product", "cart",
    "checkout", "admin", "dashboard", "profile",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "do", "does", "did",
    "will", "would", "should", "could", "may", "might", "must", "can", "what", "which",
    "where", "when", "why", "how", "show", "create", "generate", "make", "get", "file",
    "files", "module", "modules", "component", "components", "depend", "depends",
    "dependency", "dependencies", "diagram", "map", "for", "with", "from", "and",
];

fn file_pattern_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9_.\-]+\.(py|ts|tsx|js|jsx|java|cs|cpp|c))\b").unwrap()
    })
}

fn parse_depth(lower: &str) -> Option<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?:depth|level)\s*[:=]?\s*(\d+)").unwrap());
    re.captures(lower).and_then(|c| c[1].parse().ok())
}

fn parse_diagram_query(message: &str) -> DiagramQuery {
    let lower = message.to_lowercase();
    let mut query = DiagramQuery::default();

    if let Some(captures) = file_pattern_re().captures(message) {
        query.file_pattern = Some(captures[1].to_string());
    }

    // Dependency direction: "what depends on X" wants callers; "what does
    // X depend on" wants callees.
    static INCOMING_RE: OnceLock<Regex> = OnceLock::new();
    static OUTGOING_RE: OnceLock<Regex> = OnceLock::new();
    let incoming = INCOMING_RE.get_or_init(|| {
        Regex::new(r"(what|which|show).*(file|module|component)s?.*(depend|call|use)s?\s+on").unwrap()
    });
    let outgoing = OUTGOING_RE.get_or_init(|| {
        Regex::new(r"(what|which).*(does|do).*(depend|call|use)s?\s+on").unwrap()
    });
    if outgoing.is_match(&lower) {
        query.direction = Some(Direction::Outgoing);
    } else if incoming.is_match(&lower) {
        query.direction = Some(Direction::Incoming);
    }

    for (kind, keywords) in KIND_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            query.module_kinds.push(kind.to_string());
        }
    }

    for feature in FEATURE_KEYWORDS {
        if lower.contains(feature) {
            query.feature_names.push(feature.to_string());
        }
    }

    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let word_re = WORD_RE.get_or_init(|| Regex::new(r"\b[a-zA-Z][a-zA-Z0-9_]*\b").unwrap());
    for word in word_re.find_iter(&lower) {
        let word = word.as_str();
        if word.len() > 2
            && !STOP_WORDS.contains(&word)
            && !query.module_kinds.iter().any(|k| k == word)
            && !query.feature_names.iter().any(|f| f == word)
            && !query.search_terms.iter().any(|t| t == word)
        {
            query.search_terms.push(word.to_string());
        }
    }

    if let Some(pattern) = &query.file_pattern {
        let base = pattern.split('.').next().unwrap_or_default().to_lowercase();
        if !base.is_empty() && !query.search_terms.contains(&base) {
            query.search_terms.push(base);
        }
    }

    query
}

// ---------------------------------------------------------------------------
// Output formats
// ---------------------------------------------------------------------------

fn display_name(path: &str) -> String {
    let shortened = if path.len() > 30 {
        match path.rsplit('/').next() {
            Some(name) if name.len() < path.len() => format!(".../{}", name),
            _ => path.chars().take(30).collect::<String>(),
        }
    } else {
        path.to_string()
    };
    shortened.replace('"', "&quot;")
}

fn generate_mermaid(graph: &GraphData) -> String {
    let mut mermaid = String::from("graph TD\n");

    if graph.focused {
        mermaid.push_str(
            "  classDef targetModule fill:#ff6b6b,stroke:#c92a2a,stroke-width:3px,color:#fff\n\
               classDef serviceModule fill:#4ecdc4,stroke:#26a69a,stroke-width:2px\n\
               classDef controllerModule fill:#95e1d3,stroke:#6ab5b8,stroke-width:2px\n\
               classDef entityModule fill:#ffeaa7,stroke:#fdcb6e,stroke-width:2px\n\
               classDef defaultModule fill:#dfe6e9,stroke:#b2bec3,stroke-width:1px\n\n",
        );
    }

    let mut node_map: HashMap<&str, String> = HashMap::new();
    let mut classes: Vec<(String, &'static str)> = Vec::new();

    for (i, module_id) in graph.module_ids.iter().enumerate() {
        let node_id = format!("M{}", i);
        let (path, kinds) = graph
            .info
            .get(module_id)
            .cloned()
            .unwrap_or_else(|| (module_id.clone(), Vec::new()));
        mermaid.push_str(&format!("  {}[\"{}\"]\n", node_id, display_name(&path)));

        if graph.focused {
            let class = if graph.target_modules.contains(module_id) {
                "targetModule"
            } else if kinds.iter().any(|k| k == "service") {
                "serviceModule"
            } else if kinds.iter().any(|k| k == "controller") {
                "controllerModule"
            } else if kinds.iter().any(|k| k == "entity") {
                "entityModule"
            } else {
                "defaultModule"
            };
            classes.push((node_id.clone(), class));
        }
        node_map.insert(module_id.as_str(), node_id);
    }
    mermaid.push('\n');

    for (from, to, kind) in &graph.edges {
        let (Some(from_node), Some(to_node)) =
            (node_map.get(from.as_str()), node_map.get(to.as_str()))
        else {
            continue;
        };
        if graph.focused {
            let label = {
                let mut chars = kind.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            };
            mermaid.push_str(&format!("  {} -->|\"{}\"| {}\n", from_node, label, to_node));
        } else {
            mermaid.push_str(&format!("  {} --> {}\n", from_node, to_node));
        }
    }

    for (node_id, class) in &classes {
        mermaid.push_str(&format!("  class {} {}\n", node_id, class));
    }

    if graph.focused && graph.direction != Direction::Both {
        let text = match graph.direction {
            Direction::Incoming => "Incoming dependencies (callers)",
            _ => "Outgoing dependencies (callees)",
        };
        mermaid.push_str(&format!("\n  note1[\"{}\"]\n", text));
    }

    mermaid
}

fn generate_dot(graph: &GraphData) -> String {
    let safe = |id: &str| id.replace([':', '/', '.', '-'], "_");
    let mut dot = String::from("digraph Dependencies {\n  rankdir=LR;\n  node [shape=box, style=rounded];\n\n");
    for module_id in &graph.module_ids {
        let (path, _) = graph
            .info
            .get(module_id)
            .cloned()
            .unwrap_or_else(|| (module_id.clone(), Vec::new()));
        dot.push_str(&format!(
            "  \"{}\" [label=\"{}\"];\n",
            safe(module_id),
            display_name(&path)
        ));
    }
    dot.push('\n');
    for (from, to, _) in &graph.edges {
        dot.push_str(&format!("  \"{}\" -> \"{}\";\n", safe(from), safe(to)));
    }
    dot.push_str("}\n");
    dot
}

fn generate_text_tree(graph: &GraphData) -> String {
    if graph.module_ids.is_empty() {
        return "No modules found to diagram.".to_string();
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_incoming: HashSet<&str> = HashSet::new();
    for (from, to, _) in &graph.edges {
        adjacency.entry(from.as_str()).or_default().push(to.as_str());
        has_incoming.insert(to.as_str());
    }

    let mut roots: Vec<&str> = graph
        .module_ids
        .iter()
        .map(|s| s.as_str())
        .filter(|id| !has_incoming.contains(id))
        .collect();
    if roots.is_empty() {
        roots = graph.module_ids.iter().take(10).map(|s| s.as_str()).collect();
    }

    let name = |id: &str| -> String {
        graph
            .info
            .get(id)
            .map(|(path, _)| display_name(path))
            .unwrap_or_else(|| id.to_string())
    };

    fn print_tree(
        node: &str,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<String>,
        depth: usize,
        adjacency: &HashMap<&str, Vec<&str>>,
        name: &dyn Fn(&str) -> String,
        out: &mut String,
    ) {
        if depth > 3 || !visited.insert(node.to_string()) {
            return;
        }
        out.push_str(prefix);
        out.push_str(if is_last { "└── " } else { "├── " });
        out.push_str(&name(node));
        out.push('\n');
        if let Some(children) = adjacency.get(node) {
            let shown = children.iter().take(5).collect::<Vec<_>>();
            for (i, child) in shown.iter().enumerate() {
                let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
                print_tree(
                    child,
                    &child_prefix,
                    i == shown.len() - 1,
                    visited,
                    depth + 1,
                    adjacency,
                    name,
                    out,
                );
            }
        }
    }

    let mut out = String::from("Dependency Diagram\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    for (i, root) in roots.iter().take(5).enumerate() {
        let mut visited = HashSet::new();
        print_tree(
            root,
            "",
            i == roots.len().min(5) - 1,
            &mut visited,
            0,
            &adjacency,
            &name,
            &mut out,
        );
    }
    if graph.module_ids.len() > roots.len() {
        out.push_str(&format!(
            "\n... and {} more modules\n",
            graph.module_ids.len() - roots.len()
        ));
    }
    out
}

fn merge_json(target: &mut serde_json::Value, from: serde_json::Value) {
    if let (Some(target_map), Some(from_map)) = (target.as_object_mut(), from.as_object()) {
        for (key, value) in from_map {
            target_map.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::pkg::*;
    use repograph_core::IntentCategory;
    use std::sync::Arc;

    fn module(id: &str, path: &str, kind: &[&str]) -> Module {
        Module {
            id: id.into(),
            path: path.into(),
            kind: kind.iter().map(|s| s.to_string()).collect(),
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
                ..Default::default()
            },
            modules: vec![
                module("mod:a.ts", "a.ts", &[]),
                module("mod:b.ts", "b.ts", &["service"]),
                module("mod:c.ts", "c.ts", &[]),
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
    async fn focused_diagram_includes_neighbors_both_directions() {
        // Dependency diagram of b.ts with depth 1, direction both:
        // modules included are exactly {a, b, c}.
        let engine = chain_engine();
        let generator = DiagramGenerator::new(&engine, None);
        let intent = Intent::minimal(IntentCategory::DiagramRequest, "diagram");
        let response = generator
            .generate_diagram(&intent, "show a dependency diagram of b.ts depth 1")
            .await;

        assert_eq!(response.diagram_type, "focused_dependency");
        let mut included = response.modules_included.clone();
        included.sort();
        assert_eq!(included, vec!["mod:a.ts", "mod:b.ts", "mod:c.ts"]);
        assert_eq!(response.metadata["is_focused"], serde_json::json!(true));
        assert_eq!(response.metadata["direction"], serde_json::json!("both"));
    }

    #[tokio::test]
    async fn unfocused_diagram_covers_all_modules() {
        let engine = chain_engine();
        let generator = DiagramGenerator::new(&engine, None);
        let intent = Intent::minimal(IntentCategory::DiagramRequest, "diagram");
        let response = generator
            .generate_diagram(&intent, "draw a dependency diagram")
            .await;
        assert_eq!(response.diagram_type, "dependency");
        assert_eq!(response.modules_included.len(), 3);
        assert!(response.mermaid_code.is_some());
    }

    #[tokio::test]
    async fn dot_format_on_request() {
        let engine = chain_engine();
        let generator = DiagramGenerator::new(&engine, None);
        let intent = Intent::minimal(IntentCategory::DiagramRequest, "diagram");
        let response = generator
            .generate_diagram(&intent, "dependency diagram in dot format")
            .await;
        assert_eq!(response.format, "dot");
        assert!(response.content.starts_with("digraph"));
    }

    #[test]
    fn parses_depth_and_direction() {
        assert_eq!(parse_depth("diagram with depth 3"), Some(3));
        assert_eq!(parse_depth("diagram at level 1"), Some(1));
        assert_eq!(parse_depth("just a diagram"), None);

        let query = parse_diagram_query("what does auth.service.ts depend on");
        assert_eq!(query.direction, Some(Direction::Outgoing));
        assert_eq!(query.file_pattern.as_deref(), Some("auth.service.ts"));

        let query = parse_diagram_query("which modules depend on the http service");
        assert_eq!(query.direction, Some(Direction::Incoming));
    }

    #[test]
    fn mermaid_marks_focused_targets() {
        let graph = GraphData {
            module_ids: vec!["mod:a.ts".into(), "mod:b.ts".into()],
            edges: vec![("mod:a.ts".into(), "mod:b.ts".into(), "imports".into())],
            info: [
                ("mod:a.ts".to_string(), ("a.ts".to_string(), vec![])),
                (
                    "mod:b.ts".to_string(),
                    ("b.ts".to_string(), vec!["service".to_string()]),
                ),
            ]
            .into_iter()
            .collect(),
            target_modules: vec!["mod:a.ts".into()],
            direction: Direction::Both,
            focused: true,
        };
        let mermaid = generate_mermaid(&graph);
        assert!(mermaid.starts_with("graph TD"));
        assert!(mermaid.contains("classDef targetModule"));
        assert!(mermaid.contains("class M0 targetModule"));
        assert!(mermaid.contains("class M1 serviceModule"));
        assert!(mermaid.contains("-->|\"Imports\"|"));
    }
}
