//! The PKG query engine

use regex::Regex;
use repograph_core::pkg::{
    edge_type, module_id_of_endpoint, Endpoint, Module, Pkg, Symbol,
};
use repograph_pkg::GraphStore;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Entry-point basenames (closed list).
const ENTRY_POINTS: &[&str] = &[
    "main.ts",
    "main.js",
    "main.tsx",
    "main.jsx",
    "index.ts",
    "index.js",
    "index.tsx",
    "index.jsx",
    "app.py",
    "main.py",
    "__main__.py",
    "main.java",
    "application.java",
    "program.cs",
    "main.cs",
    "main.cpp",
    "main.c",
];

/// App-component basenames (closed list); paths containing both "app" and
/// "component" also qualify.
const APP_COMPONENTS: &[&str] = &[
    "app.component.ts",
    "app.component.js",
    "app.tsx",
    "app.jsx",
    "app.ts",
    "app.js",
    "app.component.tsx",
    "app.component.jsx",
    "appcomponent.tsx",
    "appcomponent.jsx",
    "main.component.ts",
    "root.component.ts",
];

#[derive(Clone, Debug)]
pub struct Dependencies {
    pub callers: Vec<Module>,
    pub callees: Vec<Module>,
    pub fan_in: usize,
    pub fan_out: usize,
}

#[derive(Clone, Debug)]
pub struct ImpactSet {
    pub modules: Vec<Module>,
    pub module_ids: Vec<String>,
    pub files: Vec<String>,
    pub depth: usize,
}

pub struct QueryEngine {
    pkg: Arc<Pkg>,
    module_index: HashMap<String, usize>,
    symbol_index: HashMap<String, usize>,
    endpoint_index: HashMap<String, usize>,
    graph: Option<Arc<GraphStore>>,
}

impl QueryEngine {
    pub fn new(pkg: Arc<Pkg>) -> Self {
        let module_index = pkg
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        let symbol_index = pkg
            .symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let endpoint_index = pkg
            .endpoints
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self {
            pkg,
            module_index,
            symbol_index,
            endpoint_index,
            graph: None,
        }
    }

    /// Attach a graph store; queries prefer it and fall back on error.
    pub fn with_graph(mut self, graph: Option<Arc<GraphStore>>) -> Self {
        self.graph = graph;
        self
    }

    pub fn pkg(&self) -> &Pkg {
        &self.pkg
    }

    pub fn project_id(&self) -> &str {
        &self.pkg.project.id
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn module_by_id(&self, id: &str) -> Option<&Module> {
        self.module_index.get(id).map(|&i| &self.pkg.modules[i])
    }

    pub fn symbol_by_id(&self, id: &str) -> Option<&Symbol> {
        self.symbol_index.get(id).map(|&i| &self.pkg.symbols[i])
    }

    pub fn endpoint_by_id(&self, id: &str) -> Option<&Endpoint> {
        self.endpoint_index.get(id).map(|&i| &self.pkg.endpoints[i])
    }

    /// Case-insensitive substring match on the kind array.
    pub async fn modules_by_tag(&self, tag: &str) -> Vec<Module> {
        if let Some(graph) = &self.graph {
            match graph.modules_by_tag(self.project_id(), tag).await {
                Ok(modules) => return modules,
                Err(e) => debug!("graph db modules_by_tag failed, in-memory fallback: {}", e),
            }
        }
        let tag_lower = tag.to_lowercase();
        self.pkg
            .modules
            .iter()
            .filter(|m| m.kind.iter().any(|k| k.to_lowercase().contains(&tag_lower)))
            .cloned()
            .collect()
    }

    /// `*`-only glob on module paths, regex-compiled, case-insensitive.
    pub fn modules_by_path_pattern(&self, pattern: &str) -> Vec<Module> {
        let Some(re) = glob_to_regex(pattern) else {
            return Vec::new();
        };
        self.pkg
            .modules
            .iter()
            .filter(|m| re.is_match(&m.path))
            .cloned()
            .collect()
    }

    /// Exact kind match, case-insensitive.
    pub fn modules_by_kind(&self, kind: &str) -> Vec<Module> {
        let kind_lower = kind.to_lowercase();
        self.pkg
            .modules
            .iter()
            .filter(|m| m.kind.iter().any(|k| k.to_lowercase() == kind_lower))
            .cloned()
            .collect()
    }

    /// Exact basename or substring match.
    pub fn modules_by_filename(&self, filename: &str) -> Vec<Module> {
        let filename_lower = filename.to_lowercase();
        self.pkg
            .modules
            .iter()
            .filter(|m| {
                let basename = basename(&m.path).to_lowercase();
                basename == filename_lower || basename.contains(&filename_lower)
            })
            .cloned()
            .collect()
    }

    pub fn endpoints_by_path(&self, pattern: &str) -> Vec<Endpoint> {
        let Some(re) = glob_to_regex(pattern) else {
            return Vec::new();
        };
        self.pkg
            .endpoints
            .iter()
            .filter(|e| re.is_match(&e.path))
            .cloned()
            .collect()
    }

    pub fn symbols_by_name(&self, pattern: &str) -> Vec<Symbol> {
        let Some(re) = glob_to_regex(pattern) else {
            return Vec::new();
        };
        self.pkg
            .symbols
            .iter()
            .filter(|s| re.is_match(&s.name))
            .cloned()
            .collect()
    }

    pub fn endpoints_by_module(&self, module_id: &str) -> Vec<Endpoint> {
        self.pkg
            .endpoints
            .iter()
            .filter(|e| e.handler_module_id.as_deref() == Some(module_id))
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Traversals
    // -----------------------------------------------------------------------

    /// Callers (fan-in) and callees (fan-out) over imports and calls edges.
    pub async fn dependencies(&self, module_id: &str) -> Dependencies {
        if let Some(graph) = &self.graph {
            match graph.dependencies(module_id).await {
                Ok((callers, callees)) => {
                    return Dependencies {
                        fan_in: callers.len(),
                        fan_out: callees.len(),
                        callers,
                        callees,
                    };
                }
                Err(e) => debug!("graph db dependencies failed, in-memory fallback: {}", e),
            }
        }
        self.dependencies_in_memory(module_id)
    }

    fn dependencies_in_memory(&self, module_id: &str) -> Dependencies {
        let mut caller_ids: Vec<String> = Vec::new();
        let mut callee_ids: Vec<String> = Vec::new();

        for edge in self.dependency_edges() {
            let (Some(from), Some(to)) = (
                module_id_of_endpoint(&edge.from),
                module_id_of_endpoint(&edge.to),
            ) else {
                continue;
            };
            if from == to {
                continue;
            }
            if from == module_id && !callee_ids.contains(&to) {
                callee_ids.push(to);
            } else if to == module_id && !caller_ids.contains(&from) {
                caller_ids.push(from);
            }
        }

        let resolve = |ids: &[String]| -> Vec<Module> {
            ids.iter()
                .filter_map(|id| self.module_by_id(id).cloned())
                .collect()
        };

        Dependencies {
            fan_in: caller_ids.len(),
            fan_out: callee_ids.len(),
            callers: resolve(&caller_ids),
            callees: resolve(&callee_ids),
        }
    }

    fn dependency_edges(&self) -> impl Iterator<Item = &repograph_core::pkg::Edge> + '_ {
        self.pkg.edges.iter().filter(|e| {
            e.edge_type == edge_type::IMPORTS || e.edge_type == edge_type::CALLS
        })
    }

    /// BFS over the union of caller and callee directions up to `depth`,
    /// deduplicated. The seed modules are part of the result.
    pub async fn impacted_modules(&self, seeds: &[String], depth: usize) -> ImpactSet {
        if let Some(graph) = &self.graph {
            match graph.impacted_module_ids(seeds, depth).await {
                Ok(ids) => return self.impact_set_from_ids(ids, depth),
                Err(e) => debug!("graph db impact failed, in-memory fallback: {}", e),
            }
        }
        self.impacted_in_memory(seeds, depth)
    }

    fn impacted_in_memory(&self, seeds: &[String], depth: usize) -> ImpactSet {
        // Adjacency at module granularity, both directions.
        let mut neighbors: HashMap<String, HashSet<String>> = HashMap::new();
        for edge in self.dependency_edges() {
            let (Some(from), Some(to)) = (
                module_id_of_endpoint(&edge.from),
                module_id_of_endpoint(&edge.to),
            ) else {
                continue;
            };
            if from == to {
                continue;
            }
            neighbors.entry(from.clone()).or_default().insert(to.clone());
            neighbors.entry(to).or_default().insert(from);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut queue: VecDeque<(String, usize)> =
            seeds.iter().map(|s| (s.clone(), 0usize)).collect();

        while let Some((id, d)) = queue.pop_front() {
            if d > depth || !visited.insert(id.clone()) {
                continue;
            }
            order.push(id.clone());
            if let Some(next) = neighbors.get(&id) {
                for neighbor in next {
                    if !visited.contains(neighbor) {
                        queue.push_back((neighbor.clone(), d + 1));
                    }
                }
            }
        }

        self.impact_set_from_ids(order, depth)
    }

    fn impact_set_from_ids(&self, ids: Vec<String>, depth: usize) -> ImpactSet {
        let modules: Vec<Module> = ids
            .iter()
            .filter_map(|id| self.module_by_id(id).cloned())
            .collect();
        let files = modules.iter().map(|m| m.path.clone()).collect();
        ImpactSet {
            module_ids: ids,
            modules,
            files,
            depth,
        }
    }

    // -----------------------------------------------------------------------
    // Entry points and app components
    // -----------------------------------------------------------------------

    pub fn entry_point_modules(&self) -> Vec<Module> {
        self.pkg
            .modules
            .iter()
            .filter(|m| ENTRY_POINTS.contains(&basename(&m.path).to_lowercase().as_str()))
            .cloned()
            .collect()
    }

    pub fn app_component_modules(&self) -> Vec<Module> {
        self.pkg
            .modules
            .iter()
            .filter(|m| {
                let name = basename(&m.path).to_lowercase();
                let path_lower = m.path.to_lowercase();
                APP_COMPONENTS.contains(&name.as_str())
                    || (path_lower.contains("app") && path_lower.contains("component"))
            })
            .cloned()
            .collect()
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `*`-only glob compiled to a case-insensitive regex used with search
/// semantics (an unanchored pattern matches anywhere in the target).
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("(?i){}", escaped)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::pkg::*;

    fn module(id: &str, path: &str, kind: &[&str]) -> Module {
        Module {
            id: id.into(),
            path: path.into(),
            kind: kind.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn edge(from: &str, to: &str, kind: &str) -> Edge {
        Edge {
            from: from.into(),
            to: to.into(),
            edge_type: kind.into(),
            weight: 1,
        }
    }

    fn chain_pkg() -> Arc<Pkg> {
        Arc::new(Pkg {
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
                module("mod:src/login.component.ts", "src/login.component.ts", &["component"]),
                module("mod:src/auth.service.ts", "src/auth.service.ts", &["service"]),
                module("mod:src/http.service.ts", "src/http.service.ts", &["service", "util"]),
                module("mod:src/main.ts", "src/main.ts", &[]),
            ],
            symbols: vec![Symbol {
                id: "sym:mod:src/auth.service.ts:AuthService".into(),
                module_id: "mod:src/auth.service.ts".into(),
                name: "AuthService".into(),
                kind: SymbolKind::Class,
                is_exported: true,
                signature: "AuthService".into(),
                visibility: "public".into(),
                summary: None,
            }],
            endpoints: vec![Endpoint {
                id: "ep:mod:src/auth.service.ts:POST:/login".into(),
                path: "/login".into(),
                method: Some("POST".into()),
                handler_module_id: Some("mod:src/auth.service.ts".into()),
                handler_symbol: None,
                framework: Some("express".into()),
            }],
            edges: vec![
                edge("mod:src/login.component.ts", "mod:src/auth.service.ts", "imports"),
                edge("mod:src/auth.service.ts", "mod:src/http.service.ts", "imports"),
            ],
            features: vec![],
        })
    }

    #[tokio::test]
    async fn tag_lookup_is_substring_case_insensitive() {
        let engine = QueryEngine::new(chain_pkg());
        assert_eq!(engine.modules_by_tag("SERV").await.len(), 2);
        assert_eq!(engine.modules_by_tag("component").await.len(), 1);
        assert!(engine.modules_by_tag("nothing").await.is_empty());
    }

    #[test]
    fn kind_lookup_is_exact() {
        let engine = QueryEngine::new(chain_pkg());
        assert_eq!(engine.modules_by_kind("Service").len(), 2);
        assert!(engine.modules_by_kind("serv").is_empty());
    }

    #[test]
    fn path_pattern_glob() {
        let engine = QueryEngine::new(chain_pkg());
        assert_eq!(engine.modules_by_path_pattern("src/*.service.ts").len(), 2);
        assert_eq!(engine.modules_by_path_pattern("*login*").len(), 1);
    }

    #[test]
    fn filename_lookup() {
        let engine = QueryEngine::new(chain_pkg());
        assert_eq!(engine.modules_by_filename("auth.service.ts").len(), 1);
        assert_eq!(engine.modules_by_filename("service").len(), 2);
    }

    #[tokio::test]
    async fn dependencies_callers_and_callees() {
        let engine = QueryEngine::new(chain_pkg());
        let deps = engine.dependencies("mod:src/auth.service.ts").await;
        assert_eq!(deps.fan_in, 1);
        assert_eq!(deps.fan_out, 1);
        assert_eq!(deps.callers[0].id, "mod:src/login.component.ts");
        assert_eq!(deps.callees[0].id, "mod:src/http.service.ts");
    }

    #[tokio::test]
    async fn fan_symmetry() {
        // B ∈ callees(A) iff A ∈ callers(B).
        let engine = QueryEngine::new(chain_pkg());
        let a = engine.dependencies("mod:src/login.component.ts").await;
        let b = engine.dependencies("mod:src/auth.service.ts").await;
        assert!(a.callees.iter().any(|m| m.id == "mod:src/auth.service.ts"));
        assert!(b.callers.iter().any(|m| m.id == "mod:src/login.component.ts"));
    }

    #[tokio::test]
    async fn impact_bfs_both_directions() {
        let engine = QueryEngine::new(chain_pkg());
        let impact = engine
            .impacted_modules(&["mod:src/http.service.ts".to_string()], 2)
            .await;
        // http ← auth ← login, reached via the caller direction.
        assert_eq!(impact.module_ids.len(), 3);
        assert!(impact
            .module_ids
            .contains(&"mod:src/login.component.ts".to_string()));
    }

    #[tokio::test]
    async fn impact_monotonic_in_depth() {
        let engine = QueryEngine::new(chain_pkg());
        let seeds = vec!["mod:src/http.service.ts".to_string()];
        let d0 = engine.impacted_modules(&seeds, 0).await;
        let d1 = engine.impacted_modules(&seeds, 1).await;
        let d2 = engine.impacted_modules(&seeds, 2).await;
        let set = |impact: &ImpactSet| -> HashSet<String> {
            impact.module_ids.iter().cloned().collect()
        };
        assert!(set(&d0).is_subset(&set(&d1)));
        assert!(set(&d1).is_subset(&set(&d2)));
        assert_eq!(d0.module_ids.len(), 1);
        assert_eq!(d1.module_ids.len(), 2);
    }

    #[tokio::test]
    async fn impact_handles_cycles() {
        let mut pkg = (*chain_pkg()).clone();
        pkg.edges.push(edge(
            "mod:src/http.service.ts",
            "mod:src/login.component.ts",
            "imports",
        ));
        let engine = QueryEngine::new(Arc::new(pkg));
        let impact = engine
            .impacted_modules(&["mod:src/login.component.ts".to_string()], 5)
            .await;
        assert_eq!(impact.module_ids.len(), 3);
    }

    #[test]
    fn entry_points_closed_list() {
        let engine = QueryEngine::new(chain_pkg());
        let entries = engine.entry_point_modules();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "src/main.ts");
    }

    #[test]
    fn app_components_by_name_or_path() {
        let mut pkg = (*chain_pkg()).clone();
        pkg.modules.push(Module {
            id: "mod:src/app/app.component.ts".into(),
            path: "src/app/app.component.ts".into(),
            ..Default::default()
        });
        let engine = QueryEngine::new(Arc::new(pkg));
        let components = engine.app_component_modules();
        assert!(components
            .iter()
            .any(|m| m.path == "src/app/app.component.ts"));
    }

    #[test]
    fn endpoints_by_path_pattern() {
        let engine = QueryEngine::new(chain_pkg());
        assert_eq!(engine.endpoints_by_path("/login").len(), 1);
        assert_eq!(engine.endpoints_by_path("/log*").len(), 1);
        assert!(engine.endpoints_by_path("/missing").is_empty());
    }

    #[test]
    fn symbol_wildcard_search() {
        let engine = QueryEngine::new(chain_pkg());
        assert_eq!(engine.symbols_by_name("Auth*").len(), 1);
        assert_eq!(engine.symbols_by_name("*service*").len(), 1);
    }
}
