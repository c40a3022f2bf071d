//! PKG builder — assembles the graph document from the extraction passes
//!
//! Pass order: metadata → modules → preliminary symbols → endpoints →
//! relationships → populate module.imports from imports-edges → rebuild
//! symbols applying the fan-in threshold → features from path prefixes.

use crate::endpoints::extract_endpoints;
use crate::metadata::extract_project_metadata;
use crate::normalizer::{normalize, Definitions, Language};
use crate::relations::{extract_relationships, FanStats, RelationInput};
use crate::scanner::{feature_id, module_id, scan_repo, symbol_id};
use repograph_core::pkg::{
    edge_type, Endpoint, Feature, Module, Pkg, Symbol, SymbolKind, PKG_VERSION,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

struct ModuleRecord {
    module: Module,
    language: Language,
    defs: Definitions,
    source: String,
}

pub struct PkgBuilder {
    repo_root: std::path::PathBuf,
    fan_threshold: usize,
    include_features: bool,
}

impl PkgBuilder {
    pub fn new(repo_root: impl AsRef<Path>, fan_threshold: usize) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            fan_threshold,
            include_features: true,
        }
    }

    pub fn include_features(mut self, include: bool) -> Self {
        self.include_features = include;
        self
    }

    /// Run the full pipeline and produce a PKG document.
    pub fn build(&self) -> repograph_core::Result<Pkg> {
        info!("building PKG for {}", self.repo_root.display());

        let (project, git_sha) = extract_project_metadata(&self.repo_root);
        let frameworks = project.frameworks.clone();

        // First pass: scan + normalize into module records. Files whose
        // parse yields nothing are dropped and logged.
        let mut records = Vec::new();
        for file in scan_repo(&self.repo_root) {
            let source = match std::fs::read_to_string(&file.abs_path) {
                Ok(s) => s,
                Err(e) => {
                    debug!("skipping unreadable {}: {}", file.rel_path, e);
                    continue;
                }
            };
            let Some(defs) = normalize(&file.abs_path, &source) else {
                debug!("dropping {} (no extractable definitions)", file.rel_path);
                continue;
            };
            let id = module_id(&file.rel_path);
            let loc = source.lines().filter(|l| !l.trim().is_empty()).count();
            let hash = hex_digest(source.as_bytes());
            let kinds = detect_module_kinds(&file.rel_path, &defs, &frameworks);

            let module = Module {
                id,
                path: file.rel_path.clone(),
                kind: kinds,
                loc,
                hash,
                exports: Vec::new(),
                imports: Vec::new(),
                module_summary: None,
                code_patterns: defs.code_patterns.clone(),
                ui_elements: defs.ui_elements.clone(),
                file_structure: defs.file_structure.clone(),
            };
            records.push(ModuleRecord {
                module,
                language: file.language,
                defs,
                source,
            });
        }
        info!("modules built: {}", records.len());

        // Endpoints per module.
        let mut endpoints: Vec<Endpoint> = Vec::new();
        for record in &records {
            endpoints.extend(extract_endpoints(
                &record.module.id,
                &record.source,
                &frameworks,
            ));
        }
        info!("endpoints built: {}", endpoints.len());

        // Relationships.
        let inputs: Vec<RelationInput<'_>> = records
            .iter()
            .map(|r| RelationInput {
                module_id: &r.module.id,
                rel_path: &r.module.path,
                language: r.language,
                defs: &r.defs,
            })
            .collect();
        let (edges, fan_stats) = extract_relationships(&inputs, &endpoints);
        drop(inputs);
        info!("relationships extracted: {} edges", edges.len());

        // Populate module.imports from imports-edges, never from raw text.
        let mut imports_by_module: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &edges {
            if edge.edge_type == edge_type::IMPORTS {
                let entry = imports_by_module.entry(edge.from.clone()).or_default();
                if !entry.contains(&edge.to) {
                    entry.push(edge.to.clone());
                }
            }
        }
        for record in &mut records {
            if let Some(imports) = imports_by_module.remove(&record.module.id) {
                record.module.imports = imports;
            }
        }

        // Final symbol pass with the fan-in threshold applied.
        let symbols = self.build_symbols(&mut records, &fan_stats);
        info!("symbols built: {}", symbols.len());

        // Features from path prefixes.
        let features = if self.include_features {
            build_features(&records)
        } else {
            Vec::new()
        };

        let pkg = Pkg {
            version: PKG_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            git_sha,
            project,
            modules: records.into_iter().map(|r| r.module).collect(),
            symbols,
            endpoints,
            edges,
            features,
        };

        if let Err(problems) = pkg.validate() {
            // A structurally broken PKG is a builder bug, not user input.
            warn!("PKG failed validation: {} problems", problems.len());
            for problem in problems.iter().take(10) {
                warn!("  {}", problem);
            }
        }

        Ok(pkg)
    }

    /// Build the symbols table and populate module exports. Modules whose
    /// fan-in clears the threshold carry symbol summaries (docstrings);
    /// others don't.
    fn build_symbols(&self, records: &mut [ModuleRecord], fan_stats: &FanStats) -> Vec<Symbol> {
        let mut symbols = Vec::new();

        for record in records.iter_mut() {
            let module_id = record.module.id.clone();
            let (fan_in, _) = fan_stats.get(&module_id).copied().unwrap_or((0, 0));
            let include_details = fan_in >= self.fan_threshold;
            record.module.exports.clear();

            for function in &record.defs.functions {
                let id = symbol_id(&module_id, &function.name);
                symbols.push(Symbol {
                    id: id.clone(),
                    module_id: module_id.clone(),
                    name: function.name.clone(),
                    kind: SymbolKind::Function,
                    is_exported: true,
                    signature: format!("{}({})", function.name, function.parameters),
                    visibility: "public".to_string(),
                    summary: if include_details {
                        function.docstring.clone()
                    } else {
                        None
                    },
                });
                record.module.exports.push(id);
            }

            for class in &record.defs.classes {
                let id = symbol_id(&module_id, &class.name);
                symbols.push(Symbol {
                    id: id.clone(),
                    module_id: module_id.clone(),
                    name: class.name.clone(),
                    kind: SymbolKind::Class,
                    is_exported: true,
                    signature: class.name.clone(),
                    visibility: "public".to_string(),
                    summary: if include_details {
                        class.docstring.clone()
                    } else {
                        None
                    },
                });
                record.module.exports.push(id);

                for method in &class.methods {
                    let qualified = format!("{}.{}", class.name, method.name);
                    symbols.push(Symbol {
                        id: symbol_id(&module_id, &qualified),
                        module_id: module_id.clone(),
                        name: qualified.clone(),
                        kind: SymbolKind::Method,
                        is_exported: false,
                        signature: format!("{}({})", method.name, method.parameters),
                        visibility: "public".to_string(),
                        summary: None,
                    });
                }
            }

            for interface in &record.defs.interfaces {
                let id = symbol_id(&module_id, &interface.name);
                symbols.push(Symbol {
                    id: id.clone(),
                    module_id: module_id.clone(),
                    name: interface.name.clone(),
                    kind: SymbolKind::Interface,
                    is_exported: true,
                    signature: interface.name.clone(),
                    visibility: "public".to_string(),
                    summary: None,
                });
                record.module.exports.push(id);
            }
        }

        symbols
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Module kind tags from filename, decorators, and detected frameworks.
fn detect_module_kinds(rel_path: &str, defs: &Definitions, frameworks: &[String]) -> Vec<String> {
    let mut kinds = Vec::new();
    let file_name = rel_path
        .rsplit('/')
        .next()
        .unwrap_or(rel_path)
        .to_lowercase();
    let decorators_lower: Vec<String> = defs
        .code_patterns
        .decorators
        .iter()
        .map(|d| d.to_lowercase())
        .collect();
    let has_decorator = |name: &str| decorators_lower.iter().any(|d| d == name);

    let push = |kind: &str, kinds: &mut Vec<String>| {
        if !kinds.iter().any(|k| k == kind) {
            kinds.push(kind.to_string());
        }
    };

    if frameworks.iter().any(|f| f == "nestjs") || frameworks.iter().any(|f| f == "spring-boot") {
        if file_name.contains("controller")
            || has_decorator("controller")
            || has_decorator("restcontroller")
        {
            push("controller", &mut kinds);
        }
        if file_name.contains("service") || has_decorator("injectable") || has_decorator("service")
        {
            push("service", &mut kinds);
        }
        if file_name.contains("repository") || has_decorator("repository") {
            push("repository", &mut kinds);
        }
        if file_name.contains("module") {
            push("module", &mut kinds);
        }
    } else {
        if file_name.contains("controller") {
            push("controller", &mut kinds);
        }
        if file_name.contains("service") {
            push("service", &mut kinds);
        }
        if file_name.contains("repository") {
            push("repository", &mut kinds);
        }
        if file_name.contains(".module.") {
            push("module", &mut kinds);
        }
    }

    if file_name.contains("test") || file_name.contains("spec") {
        push("test", &mut kinds);
    }
    if file_name.contains("util") || file_name.contains("helper") {
        push("util", &mut kinds);
    }
    if file_name.contains("entity") || file_name.contains("model") {
        push("entity", &mut kinds);
    }
    if file_name.contains("component") || has_decorator("component") {
        push("component", &mut kinds);
    }

    kinds
}

/// Every non-trivial ancestor folder of a module's path becomes a Feature
/// node that contains the module.
fn build_features(records: &[ModuleRecord]) -> Vec<Feature> {
    let mut features: Vec<Feature> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let mut current = String::new();
        let parts: Vec<&str> = record.module.path.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if part.is_empty() {
                continue;
            }
            current = if current.is_empty() {
                part.to_string()
            } else {
                format!("{}/{}", current, part)
            };
            let id = feature_id(&current);
            let idx = *index.entry(id.clone()).or_insert_with(|| {
                features.push(Feature {
                    id,
                    name: part.to_string(),
                    path: current.clone(),
                    module_ids: Vec::new(),
                });
                features.len() - 1
            });
            if !features[idx].module_ids.contains(&record.module.id) {
                features[idx].module_ids.push(record.module.id.clone());
            }
        }
    }

    features
}

/// Generate the PKG for a repo, honoring the file cache.
///
/// With `use_cache`, a cached document whose `gitSha` matches the current
/// repo SHA is returned without re-running the parsers. The fresh document
/// is written back to `<repo>/pkg.json` and returned.
pub fn generate_pkg(
    repo_root: &Path,
    fan_threshold: usize,
    use_cache: bool,
) -> repograph_core::Result<Pkg> {
    if use_cache {
        if let Some(cached) = crate::store::load_cached_pkg(repo_root) {
            info!(
                "using cached PKG for {} (sha {})",
                repo_root.display(),
                cached.git_sha.as_deref().unwrap_or("none")
            );
            return Ok(cached);
        }
    }

    let pkg = PkgBuilder::new(repo_root, fan_threshold).build()?;
    if let Err(e) = crate::store::write_pkg_cache(repo_root, &pkg) {
        warn!("failed to write pkg.json cache: {}", e);
    }
    Ok(pkg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture_repo() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "src/auth/auth.service.py",
            "from src.db.store import fetch\n\ndef authenticate(user):\n    \"\"\"Check a user.\"\"\"\n    return fetch(user)\n",
        );
        write(
            tmp.path(),
            "src/db/store.py",
            "def fetch(key):\n    return None\n",
        );
        write(
            tmp.path(),
            "src/auth/test_auth.py",
            "from src.auth.auth.service import authenticate\n\ndef test_auth():\n    pass\n",
        );
        tmp
    }

    #[test]
    fn builder_produces_valid_pkg() {
        let repo = fixture_repo();
        let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
        assert!(pkg.validate().is_ok());
        assert_eq!(pkg.version, "1.0.0");
        assert_eq!(pkg.modules.len(), 3);
        assert!(pkg
            .modules
            .iter()
            .any(|m| m.id == "mod:src/auth/auth.service.py"));
        // No git repo in the fixture: gitSha is absent.
        assert!(pkg.git_sha.is_none());
    }

    #[test]
    fn module_imports_come_from_edges() {
        let repo = fixture_repo();
        let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
        let service = pkg
            .modules
            .iter()
            .find(|m| m.id == "mod:src/auth/auth.service.py")
            .unwrap();
        assert_eq!(service.imports, vec!["mod:src/db/store.py".to_string()]);
        // The edge behind that import exists too.
        assert!(pkg.edges.iter().any(|e| {
            e.from == "mod:src/auth/auth.service.py"
                && e.to == "mod:src/db/store.py"
                && e.edge_type == "imports"
        }));
    }

    #[test]
    fn fan_threshold_gates_symbol_summaries() {
        let repo = fixture_repo();
        // Threshold 0: everything carries summaries.
        let pkg = PkgBuilder::new(repo.path(), 0).build().unwrap();
        let authenticate = pkg
            .symbols
            .iter()
            .find(|s| s.name == "authenticate")
            .unwrap();
        assert_eq!(authenticate.summary.as_deref(), Some("Check a user."));

        // Threshold 3: fan-in of the service module is below it.
        let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
        let authenticate = pkg
            .symbols
            .iter()
            .find(|s| s.name == "authenticate")
            .unwrap();
        assert!(authenticate.summary.is_none());
    }

    #[test]
    fn features_cover_folder_hierarchy() {
        let repo = fixture_repo();
        let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
        let ids: Vec<&str> = pkg.features.iter().map(|f| f.id.as_str()).collect();
        assert!(ids.contains(&"feat:src"));
        assert!(ids.contains(&"feat:src/auth"));
        assert!(ids.contains(&"feat:src/db"));
        let src = pkg.features.iter().find(|f| f.id == "feat:src").unwrap();
        assert_eq!(src.module_ids.len(), 3);
    }

    #[test]
    fn module_kind_tags() {
        let repo = fixture_repo();
        let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
        let service = pkg
            .modules
            .iter()
            .find(|m| m.id == "mod:src/auth/auth.service.py")
            .unwrap();
        assert!(service.kind.iter().any(|k| k == "service"));
        let test = pkg
            .modules
            .iter()
            .find(|m| m.id == "mod:src/auth/test_auth.py")
            .unwrap();
        assert!(test.kind.iter().any(|k| k == "test"));
    }

    #[test]
    fn stable_ids_across_runs() {
        let repo = fixture_repo();
        let first = PkgBuilder::new(repo.path(), 3).build().unwrap();
        let second = PkgBuilder::new(repo.path(), 3).build().unwrap();
        let first_ids: Vec<&String> = first.modules.iter().map(|m| &m.id).collect();
        let second_ids: Vec<&String> = second.modules.iter().map(|m| &m.id).collect();
        assert_eq!(first_ids, second_ids);
        let first_hashes: Vec<&String> = first.modules.iter().map(|m| &m.hash).collect();
        let second_hashes: Vec<&String> = second.modules.iter().map(|m| &m.hash).collect();
        assert_eq!(first_hashes, second_hashes);
    }
}
