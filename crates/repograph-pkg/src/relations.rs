//! Relationship extraction — resolves raw imports and calls to stable IDs

use crate::normalizer::{Definitions, Language};
use crate::scanner::symbol_id;
use repograph_core::pkg::{edge_type, Edge, Endpoint};
use std::collections::{HashMap, HashSet};

/// One module's inputs to relationship extraction.
pub struct RelationInput<'a> {
    pub module_id: &'a str,
    pub rel_path: &'a str,
    pub language: Language,
    pub defs: &'a Definitions,
}

/// Fan-in / fan-out per module, derived from the final edge list.
pub type FanStats = HashMap<String, (usize, usize)>;

fn parent_dir(rel_path: &str) -> &str {
    match rel_path.rfind('/') {
        Some(idx) => &rel_path[..idx],
        None => "",
    }
}

/// Lexically normalize `a/b/../c` style paths.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        normalize_path(rest)
    } else {
        normalize_path(&format!("{}/{}", dir, rest))
    }
}

struct Resolver<'a> {
    by_path: HashMap<&'a str, &'a str>,
}

impl<'a> Resolver<'a> {
    fn new(inputs: &'a [RelationInput<'a>]) -> Self {
        Self {
            by_path: inputs
                .iter()
                .map(|input| (input.rel_path, input.module_id))
                .collect(),
        }
    }

    fn lookup(&self, candidate: &str) -> Option<&'a str> {
        self.by_path.get(candidate.trim_start_matches("./")).copied()
    }

    /// Try a bare path, then each known source extension, then index files.
    fn probe(&self, base: &str, language: Language) -> Option<&'a str> {
        if let Some(id) = self.lookup(base) {
            return Some(id);
        }
        for ext in language.extensions() {
            if let Some(id) = self.lookup(&format!("{}.{}", base, ext)) {
                return Some(id);
            }
        }
        for ext in language.extensions() {
            if let Some(id) = self.lookup(&format!("{}/index.{}", base, ext)) {
                return Some(id);
            }
        }
        if language == Language::Python {
            if let Some(id) = self.lookup(&format!("{}/__init__.py", base)) {
                return Some(id);
            }
        }
        None
    }

    /// Source roots probed for non-relative imports, per language.
    fn source_roots(language: Language) -> &'static [&'static str] {
        match language {
            Language::Java => &["src/main/java", "src", ""],
            Language::TypeScript | Language::JavaScript => &["src", "", "app", "lib"],
            Language::C | Language::Cpp => &["include", "src", ""],
            _ => &["", "src"],
        }
    }

    /// Resolve one import specifier for the importing module.
    /// Unresolvable imports return `None` and are dropped, not errored.
    fn resolve(&self, importer_dir: &str, spec: &str, language: Language) -> Option<&'a str> {
        if spec.is_empty() {
            return None;
        }

        // Relative specifiers resolve against the importing module's directory.
        if spec.starts_with("./") || spec.starts_with("../") {
            return self.probe(&join(importer_dir, spec), language);
        }
        if language == Language::Python && spec.starts_with('.') {
            // `.foo` and `..pkg.mod`: leading dots climb the package tree.
            let levels = spec.chars().take_while(|&c| c == '.').count();
            let rest = spec[levels..].replace('.', "/");
            let mut dir = importer_dir;
            for _ in 1..levels {
                dir = parent_dir(dir);
            }
            return self.probe(&join(dir, &rest), language);
        }

        // Absolute: try configured source roots before giving up.
        let as_path = match language {
            Language::Python | Language::Java => spec.replace('.', "/"),
            _ => spec.to_string(),
        };
        for root in Self::source_roots(language) {
            if let Some(id) = self.probe(&join(root, &as_path), language) {
                return Some(id);
            }
        }
        // Includes are also importer-relative in C family code.
        if matches!(language, Language::C | Language::Cpp) {
            return self.probe(&join(importer_dir, &as_path), language);
        }
        None
    }
}

/// Extract typed edges and per-module fan statistics.
pub fn extract_relationships(
    inputs: &[RelationInput<'_>],
    endpoints: &[Endpoint],
) -> (Vec<Edge>, FanStats) {
    let resolver = Resolver::new(inputs);
    let mut edges: Vec<Edge> = Vec::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    let mut push_edge = |edges: &mut Vec<Edge>, from: String, to: String, kind: &str| {
        if from == to {
            return;
        }
        if seen.insert((from.clone(), to.clone(), kind.to_string())) {
            edges.push(Edge {
                from,
                to,
                edge_type: kind.to_string(),
                weight: 1,
            });
        }
    };

    // Name → (module_id, symbol_id) for classes and interfaces, used by
    // extends/implements resolution; ambiguous names resolve to nothing.
    let mut type_symbols: HashMap<&str, Vec<(&str, String)>> = HashMap::new();
    // Name → (module_id, symbol_id) for exported top-level symbols, used
    // by conservative call-edge resolution.
    let mut exported_symbols: HashMap<&str, Vec<(&str, String)>> = HashMap::new();

    for input in inputs {
        for class in &input.defs.classes {
            type_symbols
                .entry(class.name.as_str())
                .or_default()
                .push((input.module_id, symbol_id(input.module_id, &class.name)));
        }
        for interface in &input.defs.interfaces {
            type_symbols
                .entry(interface.name.as_str())
                .or_default()
                .push((
                    input.module_id,
                    symbol_id(input.module_id, &interface.name),
                ));
        }
        for function in &input.defs.functions {
            exported_symbols
                .entry(function.name.as_str())
                .or_default()
                .push((
                    input.module_id,
                    symbol_id(input.module_id, &function.name),
                ));
        }
    }

    // Imports: specifiers resolved against the tree; includes behave the same.
    let mut imports_of: HashMap<&str, HashSet<&str>> = HashMap::new();
    for input in inputs {
        let dir = parent_dir(input.rel_path);
        for spec in input.defs.imports.iter().chain(&input.defs.includes) {
            if let Some(target) = resolver.resolve(dir, spec, input.language) {
                if target != input.module_id {
                    imports_of.entry(input.module_id).or_default().insert(target);
                    push_edge(
                        &mut edges,
                        input.module_id.to_string(),
                        target.to_string(),
                        edge_type::IMPORTS,
                    );
                }
            }
        }
    }

    // Extends / implements from class headers: resolved only when the base
    // name is unambiguous across the tree.
    for input in inputs {
        for class in &input.defs.classes {
            let from = symbol_id(input.module_id, &class.name);
            for (names, kind) in [
                (&class.extends, edge_type::EXTENDS),
                (&class.implements, edge_type::IMPLEMENTS),
            ] {
                for name in names {
                    let candidates = type_symbols.get(name.as_str());
                    if let Some([(target_module, target_symbol)]) =
                        candidates.map(|c| c.as_slice())
                    {
                        if *target_module != input.module_id {
                            push_edge(
                                &mut edges,
                                from.clone(),
                                target_symbol.clone(),
                                kind,
                            );
                        }
                    }
                }
            }
        }
    }

    // Calls are conservative: only when the callee name maps to exactly one
    // symbol in a different module that the caller imports.
    for input in inputs {
        let imported = imports_of.get(input.module_id);
        for call in &input.defs.calls {
            let Some([(target_module, target_symbol)]) = exported_symbols
                .get(call.as_str())
                .map(|c| c.as_slice())
            else {
                continue;
            };
            if *target_module == input.module_id {
                continue;
            }
            let is_imported = imported.is_some_and(|set| set.contains(target_module));
            if is_imported {
                push_edge(
                    &mut edges,
                    input.module_id.to_string(),
                    target_symbol.clone(),
                    edge_type::CALLS,
                );
            }
        }
    }

    // Endpoint → handler symbol, where the extractor resolved one.
    for endpoint in endpoints {
        if let (Some(module), Some(symbol)) =
            (&endpoint.handler_module_id, &endpoint.handler_symbol)
        {
            push_edge(
                &mut edges,
                module.clone(),
                symbol.clone(),
                edge_type::HANDLES,
            );
        }
    }

    // Fan stats from the final module-granularity edge list.
    let mut fan: FanStats = HashMap::new();
    for input in inputs {
        fan.insert(input.module_id.to_string(), (0, 0));
    }
    for edge in &edges {
        if edge.edge_type != edge_type::IMPORTS && edge.edge_type != edge_type::CALLS {
            continue;
        }
        let from = repograph_core::pkg::module_id_of_endpoint(&edge.from);
        let to = repograph_core::pkg::module_id_of_endpoint(&edge.to);
        if let (Some(from), Some(to)) = (from, to) {
            if from == to {
                continue;
            }
            if let Some(entry) = fan.get_mut(&from) {
                entry.1 += 1;
            }
            if let Some(entry) = fan.get_mut(&to) {
                entry.0 += 1;
            }
        }
    }

    (edges, fan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{ClassDef, FunctionDef};

    fn defs_with_imports(imports: &[&str]) -> Definitions {
        Definitions {
            imports: imports.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn relative_ts_import_resolves_with_extension() {
        let a = defs_with_imports(&["./util"]);
        let b = Definitions::default();
        let inputs = vec![
            RelationInput {
                module_id: "mod:src/app.ts",
                rel_path: "src/app.ts",
                language: Language::TypeScript,
                defs: &a,
            },
            RelationInput {
                module_id: "mod:src/util.ts",
                rel_path: "src/util.ts",
                language: Language::TypeScript,
                defs: &b,
            },
        ];
        let (edges, fan) = extract_relationships(&inputs, &[]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "mod:src/app.ts");
        assert_eq!(edges[0].to, "mod:src/util.ts");
        assert_eq!(edges[0].edge_type, "imports");
        assert_eq!(fan["mod:src/util.ts"], (1, 0));
        assert_eq!(fan["mod:src/app.ts"], (0, 1));
    }

    #[test]
    fn index_file_fallback() {
        let a = defs_with_imports(&["./components"]);
        let b = Definitions::default();
        let inputs = vec![
            RelationInput {
                module_id: "mod:src/app.ts",
                rel_path: "src/app.ts",
                language: Language::TypeScript,
                defs: &a,
            },
            RelationInput {
                module_id: "mod:src/components/index.ts",
                rel_path: "src/components/index.ts",
                language: Language::TypeScript,
                defs: &b,
            },
        ];
        let (edges, _) = extract_relationships(&inputs, &[]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "mod:src/components/index.ts");
    }

    #[test]
    fn python_dotted_import_resolves() {
        let a = defs_with_imports(&["auth.tokens"]);
        let b = Definitions::default();
        let inputs = vec![
            RelationInput {
                module_id: "mod:main.py",
                rel_path: "main.py",
                language: Language::Python,
                defs: &a,
            },
            RelationInput {
                module_id: "mod:auth/tokens.py",
                rel_path: "auth/tokens.py",
                language: Language::Python,
                defs: &b,
            },
        ];
        let (edges, _) = extract_relationships(&inputs, &[]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "mod:auth/tokens.py");
    }

    #[test]
    fn unresolvable_imports_dropped() {
        let a = defs_with_imports(&["left-pad", "react", "./missing"]);
        let inputs = vec![RelationInput {
            module_id: "mod:src/app.ts",
            rel_path: "src/app.ts",
            language: Language::TypeScript,
            defs: &a,
        }];
        let (edges, fan) = extract_relationships(&inputs, &[]);
        assert!(edges.is_empty());
        assert_eq!(fan["mod:src/app.ts"], (0, 0));
    }

    #[test]
    fn duplicate_edges_collapsed() {
        let a = defs_with_imports(&["./util", "./util.ts"]);
        let b = Definitions::default();
        let inputs = vec![
            RelationInput {
                module_id: "mod:app.ts",
                rel_path: "app.ts",
                language: Language::TypeScript,
                defs: &a,
            },
            RelationInput {
                module_id: "mod:util.ts",
                rel_path: "util.ts",
                language: Language::TypeScript,
                defs: &b,
            },
        ];
        let (edges, _) = extract_relationships(&inputs, &[]);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn extends_edge_between_modules() {
        let base = Definitions {
            classes: vec![ClassDef {
                name: "BaseComponent".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let derived = Definitions {
            classes: vec![ClassDef {
                name: "LoginComponent".into(),
                extends: vec!["BaseComponent".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let inputs = vec![
            RelationInput {
                module_id: "mod:base.ts",
                rel_path: "base.ts",
                language: Language::TypeScript,
                defs: &base,
            },
            RelationInput {
                module_id: "mod:login.ts",
                rel_path: "login.ts",
                language: Language::TypeScript,
                defs: &derived,
            },
        ];
        let (edges, _) = extract_relationships(&inputs, &[]);
        let extends: Vec<_> = edges.iter().filter(|e| e.edge_type == "extends").collect();
        assert_eq!(extends.len(), 1);
        assert_eq!(extends[0].from, "sym:mod:login.ts:LoginComponent");
        assert_eq!(extends[0].to, "sym:mod:base.ts:BaseComponent");
    }

    #[test]
    fn call_edge_requires_import() {
        let callee = Definitions {
            functions: vec![FunctionDef {
                name: "helper".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        // Caller references helper but does not import the module: no edge.
        let caller_no_import = Definitions {
            calls: vec!["helper".into()],
            ..Default::default()
        };
        let inputs = vec![
            RelationInput {
                module_id: "mod:util.ts",
                rel_path: "util.ts",
                language: Language::TypeScript,
                defs: &callee,
            },
            RelationInput {
                module_id: "mod:app.ts",
                rel_path: "app.ts",
                language: Language::TypeScript,
                defs: &caller_no_import,
            },
        ];
        let (edges, _) = extract_relationships(&inputs, &[]);
        assert!(edges.iter().all(|e| e.edge_type != "calls"));

        // With the import present, the call edge is emitted.
        let caller = Definitions {
            imports: vec!["./util".into()],
            calls: vec!["helper".into()],
            ..Default::default()
        };
        let inputs = vec![
            RelationInput {
                module_id: "mod:util.ts",
                rel_path: "util.ts",
                language: Language::TypeScript,
                defs: &callee,
            },
            RelationInput {
                module_id: "mod:app.ts",
                rel_path: "app.ts",
                language: Language::TypeScript,
                defs: &caller,
            },
        ];
        let (edges, _) = extract_relationships(&inputs, &[]);
        let calls: Vec<_> = edges.iter().filter(|e| e.edge_type == "calls").collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, "sym:mod:util.ts:helper");
    }
}
