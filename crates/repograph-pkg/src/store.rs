//! PKG persistence — file cache and graph database
//!
//! The file cache is one JSON document at `<repo>/pkg.json`, written
//! atomically (temp + rename) and validated against the repo's git SHA.
//! The graph store mirrors the document into typed nodes with containment
//! relationships; every node also carries its serialized record in a
//! `json` property so reads reconstruct the exact document.

use crate::metadata::get_git_sha;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use repograph_core::config::GraphDbConfig;
use repograph_core::pkg::{Edge, Module, Pkg};
use repograph_core::{Error, Result};
use std::path::Path;
use tracing::{debug, info, warn};

pub const CACHE_FILE: &str = "pkg.json";

/// Containment relationship types; everything else on a Module/Symbol pair
/// is a data edge with a dynamic type.
const CONTAINMENT: &[&str] = &[
    "HAS_MODULE",
    "HAS_SYMBOL",
    "HAS_ENDPOINT",
    "HAS_FEATURE",
    "HAS_METADATA",
    "CONTAINS",
];

// ---------------------------------------------------------------------------
// File cache
// ---------------------------------------------------------------------------

/// Load a cached PKG if present and still valid for the current git SHA.
/// Both-SHAs-absent (not a git tree) counts as invalid: regenerate.
pub fn load_cached_pkg(repo_root: &Path) -> Option<Pkg> {
    let cache_path = repo_root.join(CACHE_FILE);
    let content = std::fs::read_to_string(&cache_path).ok()?;
    let cached: Pkg = match serde_json::from_str(&content) {
        Ok(pkg) => pkg,
        Err(e) => {
            warn!("unreadable pkg.json at {}: {}", cache_path.display(), e);
            return None;
        }
    };

    let current_sha = get_git_sha(repo_root);
    match (&cached.git_sha, &current_sha) {
        (Some(cached_sha), Some(current)) if cached_sha == current => {
            debug!("pkg.json cache valid (sha {})", current);
            Some(cached)
        }
        (Some(_), Some(_)) => {
            info!("pkg.json cache invalidated: git SHA changed");
            None
        }
        _ => {
            debug!("pkg.json cache missing a git SHA, regenerating");
            None
        }
    }
}

/// Atomically write the cache file. Readers tolerate its absence; they must
/// never observe a partial document.
pub fn write_pkg_cache(repo_root: &Path, pkg: &Pkg) -> Result<()> {
    let cache_path = repo_root.join(CACHE_FILE);
    let tmp_path = repo_root.join(format!("{}.tmp", CACHE_FILE));
    let content = serde_json::to_string_pretty(pkg)?;
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, &cache_path)?;
    debug!("wrote {}", cache_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Graph store
// ---------------------------------------------------------------------------

pub struct GraphStore {
    graph: Graph,
    batch_size: usize,
}

impl GraphStore {
    /// Connect with exponential backoff (`retry_delay · 2^attempt`, up to
    /// `max_retries`). Returns `None` when the database is unconfigured or
    /// permanently unreachable; callers then run in-memory only.
    pub async fn connect(config: &GraphDbConfig) -> Option<Self> {
        let uri = config.uri.clone()?;
        let user = config.user.clone().unwrap_or_default();
        let password = config.password.clone().unwrap_or_default();

        for attempt in 0..=config.max_retries {
            let db_config = ConfigBuilder::default()
                .uri(&uri)
                .user(&user)
                .password(&password)
                .db(config.database.as_str())
                .build();
            let db_config = match db_config {
                Ok(c) => c,
                Err(e) => {
                    warn!("graph db config invalid: {}", e);
                    return None;
                }
            };
            match Graph::connect(db_config).await {
                Ok(graph) => {
                    info!("graph db connected: {}", uri);
                    let store = Self {
                        graph,
                        batch_size: config.batch_size.max(1),
                    };
                    if let Err(e) = store.ensure_constraints().await {
                        warn!("graph db constraint setup failed: {}", e);
                    }
                    return Some(store);
                }
                Err(e) => {
                    let delay = config.retry_delay_ms * 2u64.pow(attempt);
                    warn!(
                        "graph db connect attempt {}/{} failed: {} (retrying in {}ms)",
                        attempt + 1,
                        config.max_retries + 1,
                        e,
                        delay
                    );
                    if attempt < config.max_retries {
                        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    }
                }
            }
        }
        warn!("graph db unreachable, falling back to in-memory queries");
        None
    }

    async fn ensure_constraints(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT project_id IF NOT EXISTS FOR (n:Project) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT module_id IF NOT EXISTS FOR (n:Module) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT symbol_id IF NOT EXISTS FOR (n:Symbol) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT endpoint_id IF NOT EXISTS FOR (n:Endpoint) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT feature_id IF NOT EXISTS FOR (n:Feature) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT package_id IF NOT EXISTS FOR (n:Package) REQUIRE n.id IS UNIQUE",
            "CREATE INDEX document_url IF NOT EXISTS FOR (n:Document) ON (n.url)",
        ];
        for statement in statements {
            self.graph
                .run(query(statement))
                .await
                .map_err(|e| Error::graph_store(e.to_string()))?;
        }
        Ok(())
    }

    /// Run a chunk of upserts inside one transaction.
    async fn run_batch(&self, queries: Vec<Query>) -> Result<()> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        txn.run_queries(queries)
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        Ok(())
    }

    async fn run_batched(&self, queries: Vec<Query>) -> Result<()> {
        let mut queries = queries;
        while !queries.is_empty() {
            let rest = queries.split_off(queries.len().min(self.batch_size));
            let chunk = std::mem::replace(&mut queries, rest);
            self.run_batch(chunk).await?;
        }
        Ok(())
    }

    /// Store the whole PKG. Failures are returned, but callers treat them
    /// as a degraded path (log + continue), never as a turn failure.
    pub async fn store_pkg(&self, pkg: &Pkg) -> Result<()> {
        let project_id = pkg.project.id.clone();
        info!("storing PKG in graph db: project={}", project_id);

        // Package + Project + Metadata first; everything hangs off Project.
        self.run_batch(vec![
            query(
                "MERGE (p:Package {id: $id}) \
                 SET p.version = $version, p.generatedAt = $generated_at, p.gitSha = $git_sha",
            )
            .param("id", project_id.clone())
            .param("version", pkg.version.clone())
            .param("generated_at", pkg.generated_at.clone())
            .param("git_sha", pkg.git_sha.clone().unwrap_or_default()),
            query(
                "MERGE (p:Project {id: $id}) \
                 SET p.name = $name, p.rootPath = $root_path, p.languages = $languages, \
                     p.json = $json",
            )
            .param("id", project_id.clone())
            .param("name", pkg.project.name.clone())
            .param("root_path", pkg.project.root_path.clone())
            .param("languages", pkg.project.languages.clone())
            .param("json", serde_json::to_string(&pkg.project)?),
            query(
                "MERGE (m:Metadata {projectId: $id}) SET m.json = $json \
                 WITH m MATCH (p:Project {id: $id}) MERGE (p)-[:HAS_METADATA]->(m)",
            )
            .param("id", project_id.clone())
            .param("json", serde_json::to_string(&pkg.project.metadata)?),
        ])
        .await?;

        let mut upserts: Vec<Query> = Vec::new();
        for module in &pkg.modules {
            upserts.push(
                query(
                    "MERGE (m:Module {id: $id}) \
                     SET m.path = $path, m.kind = $kind, m.loc = $loc, m.hash = $hash, \
                         m.json = $json \
                     WITH m MATCH (p:Project {id: $project_id}) MERGE (p)-[:HAS_MODULE]->(m)",
                )
                .param("id", module.id.clone())
                .param("path", module.path.clone())
                .param("kind", module.kind.clone())
                .param("loc", module.loc as i64)
                .param("hash", module.hash.clone())
                .param("json", serde_json::to_string(module)?)
                .param("project_id", project_id.clone()),
            );
        }
        for symbol in &pkg.symbols {
            upserts.push(
                query(
                    "MERGE (s:Symbol {id: $id}) \
                     SET s.name = $name, s.moduleId = $module_id, s.json = $json \
                     WITH s MATCH (p:Project {id: $project_id}) MERGE (p)-[:HAS_SYMBOL]->(s)",
                )
                .param("id", symbol.id.clone())
                .param("name", symbol.name.clone())
                .param("module_id", symbol.module_id.clone())
                .param("json", serde_json::to_string(symbol)?)
                .param("project_id", project_id.clone()),
            );
        }
        for endpoint in &pkg.endpoints {
            upserts.push(
                query(
                    "MERGE (e:Endpoint {id: $id}) \
                     SET e.path = $path, e.method = $method, e.json = $json \
                     WITH e MATCH (p:Project {id: $project_id}) MERGE (p)-[:HAS_ENDPOINT]->(e)",
                )
                .param("id", endpoint.id.clone())
                .param("path", endpoint.path.clone())
                .param("method", endpoint.method.clone().unwrap_or_default())
                .param("json", serde_json::to_string(endpoint)?)
                .param("project_id", project_id.clone()),
            );
        }
        for feature in &pkg.features {
            upserts.push(
                query(
                    "MERGE (f:Feature {id: $id}) \
                     SET f.name = $name, f.path = $path, f.json = $json \
                     WITH f MATCH (p:Project {id: $project_id}) MERGE (p)-[:HAS_FEATURE]->(f)",
                )
                .param("id", feature.id.clone())
                .param("name", feature.name.clone())
                .param("path", feature.path.clone())
                .param("json", serde_json::to_string(feature)?)
                .param("project_id", project_id.clone()),
            );
        }
        self.run_batched(upserts).await?;

        // Feature → Module containment.
        let mut contains: Vec<Query> = Vec::new();
        for feature in &pkg.features {
            for module_id in &feature.module_ids {
                contains.push(
                    query(
                        "MATCH (f:Feature {id: $feature_id}) \
                         MATCH (m:Module {id: $module_id}) \
                         MERGE (f)-[:CONTAINS]->(m)",
                    )
                    .param("feature_id", feature.id.clone())
                    .param("module_id", module_id.clone()),
                );
            }
        }
        self.run_batched(contains).await?;

        // Data edges get a dynamic relationship type equal to upper(type).
        let mut edge_queries: Vec<Query> = Vec::new();
        for edge in &pkg.edges {
            if edge.from.is_empty() || edge.to.is_empty() {
                continue;
            }
            let rel_type: String = edge
                .edge_type
                .to_uppercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if rel_type.is_empty() {
                continue;
            }
            edge_queries.push(
                query(&format!(
                    "MATCH (a {{id: $from}}) MATCH (b {{id: $to}}) \
                     MERGE (a)-[r:{}]->(b) ON CREATE SET r.weight = $weight",
                    rel_type
                ))
                .param("from", edge.from.clone())
                .param("to", edge.to.clone())
                .param("weight", edge.weight as i64),
            );
        }
        self.run_batched(edge_queries).await?;

        info!(
            "graph db store complete: {} modules, {} symbols, {} edges",
            pkg.modules.len(),
            pkg.symbols.len(),
            pkg.edges.len()
        );
        Ok(())
    }

    /// Whether a PKG for this project ID is present in the database.
    pub async fn check_stored(&self, project_id: &str) -> bool {
        let result = self
            .graph
            .execute(
                query("MATCH (p:Project {id: $id}) RETURN p.id AS id LIMIT 1")
                    .param("id", project_id.to_string()),
            )
            .await;
        match result {
            Ok(mut rows) => matches!(rows.next().await, Ok(Some(_))),
            Err(e) => {
                debug!("check_stored failed: {}", e);
                false
            }
        }
    }

    async fn collect_json_column<T: serde::de::DeserializeOwned>(
        &self,
        cypher: &str,
        project_id: &str,
    ) -> Result<Vec<T>> {
        let mut rows = self
            .graph
            .execute(query(cypher).param("id", project_id.to_string()))
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let json: String = row
                .get("json")
                .map_err(|e| Error::graph_store(e.to_string()))?;
            if let Ok(value) = serde_json::from_str(&json) {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Reconstruct the full PKG document from the graph.
    pub async fn load_pkg(&self, project_id: &str) -> Result<Pkg> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (p:Project {id: $id}) \
                     OPTIONAL MATCH (pkg:Package {id: $id}) \
                     RETURN p.json AS json, pkg.version AS version, \
                            pkg.generatedAt AS generated_at, pkg.gitSha AS git_sha",
                )
                .param("id", project_id.to_string()),
            )
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
            .ok_or_else(|| Error::graph_store(format!("project {} not stored", project_id)))?;

        let project_json: String = row
            .get("json")
            .map_err(|e| Error::graph_store(e.to_string()))?;
        let project = serde_json::from_str(&project_json)?;
        let version: String = row.get("version").unwrap_or_default();
        let generated_at: String = row.get("generated_at").unwrap_or_default();
        let git_sha: String = row.get("git_sha").unwrap_or_default();

        let modules: Vec<Module> = self
            .collect_json_column(
                "MATCH (p:Project {id: $id})-[:HAS_MODULE]->(m:Module) RETURN m.json AS json",
                project_id,
            )
            .await?;
        let symbols = self
            .collect_json_column(
                "MATCH (p:Project {id: $id})-[:HAS_SYMBOL]->(s:Symbol) RETURN s.json AS json",
                project_id,
            )
            .await?;
        let endpoints = self
            .collect_json_column(
                "MATCH (p:Project {id: $id})-[:HAS_ENDPOINT]->(e:Endpoint) RETURN e.json AS json",
                project_id,
            )
            .await?;
        let features = self
            .collect_json_column(
                "MATCH (p:Project {id: $id})-[:HAS_FEATURE]->(f:Feature) RETURN f.json AS json",
                project_id,
            )
            .await?;
        let edges = self.load_edges(project_id).await?;

        Ok(Pkg {
            version: if version.is_empty() {
                repograph_core::pkg::PKG_VERSION.to_string()
            } else {
                version
            },
            generated_at,
            git_sha: if git_sha.is_empty() { None } else { Some(git_sha) },
            project,
            modules,
            symbols,
            endpoints,
            edges,
            features,
        })
    }

    async fn load_edges(&self, project_id: &str) -> Result<Vec<Edge>> {
        // Edge endpoints are restricted to Module or Symbol nodes of this
        // project; containment relationships are filtered out.
        let cypher = "MATCH (p:Project {id: $id})-[:HAS_MODULE|HAS_SYMBOL]->(a) \
                      MATCH (a)-[r]->(b) \
                      WHERE (b:Module OR b:Symbol) AND NOT type(r) IN $containment \
                      RETURN a.id AS from, b.id AS to, type(r) AS kind, \
                             coalesce(r.weight, 1) AS weight";
        let containment: Vec<String> = CONTAINMENT.iter().map(|s| s.to_string()).collect();
        let mut rows = self
            .graph
            .execute(
                query(cypher)
                    .param("id", project_id.to_string())
                    .param("containment", containment),
            )
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;

        let mut edges = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let from: String = row.get("from").unwrap_or_default();
            let to: String = row.get("to").unwrap_or_default();
            let kind: String = row.get("kind").unwrap_or_default();
            let weight: i64 = row.get("weight").unwrap_or(1);
            if from.is_empty() || to.is_empty() || kind.is_empty() {
                continue;
            }
            edges.push(Edge {
                from,
                to,
                edge_type: kind.to_lowercase(),
                weight: weight.max(1) as u32,
            });
        }
        Ok(edges)
    }

    /// Modules whose kind array matches a tag (case-insensitive substring).
    pub async fn modules_by_tag(&self, project_id: &str, tag: &str) -> Result<Vec<Module>> {
        let cypher = "MATCH (p:Project {id: $id})-[:HAS_MODULE]->(m:Module) \
                      WHERE any(k IN m.kind WHERE toLower(k) CONTAINS toLower($tag)) \
                      RETURN m.json AS json";
        let mut rows = self
            .graph
            .execute(
                query(cypher)
                    .param("id", project_id.to_string())
                    .param("tag", tag.to_string()),
            )
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let json: String = row
                .get("json")
                .map_err(|e| Error::graph_store(e.to_string()))?;
            if let Ok(module) = serde_json::from_str(&json) {
                out.push(module);
            }
        }
        Ok(out)
    }

    async fn modules_by_ids(&self, ids: &[String]) -> Result<Vec<Module>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = self
            .graph
            .execute(
                query("MATCH (m:Module) WHERE m.id IN $ids RETURN m.json AS json")
                    .param("ids", ids.to_vec()),
            )
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let json: String = row
                .get("json")
                .map_err(|e| Error::graph_store(e.to_string()))?;
            if let Ok(module) = serde_json::from_str(&json) {
                out.push(module);
            }
        }
        Ok(out)
    }

    /// Caller and callee module IDs over imports/calls edges. Symbol
    /// endpoints collapse to their owning module.
    pub async fn dependencies(
        &self,
        module_id: &str,
    ) -> Result<(Vec<Module>, Vec<Module>)> {
        let callers_cypher = "MATCH (a:Module)-[:IMPORTS|CALLS]->(b) \
                              WHERE b.id = $id OR b.moduleId = $id \
                              RETURN DISTINCT a.id AS mid";
        let callees_cypher = "MATCH (a:Module {id: $id})-[:IMPORTS|CALLS]->(b) \
                              RETURN DISTINCT coalesce(b.moduleId, b.id) AS mid";

        let mut caller_ids = Vec::new();
        let mut rows = self
            .graph
            .execute(query(callers_cypher).param("id", module_id.to_string()))
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let mid: String = row.get("mid").unwrap_or_default();
            if !mid.is_empty() && mid != module_id {
                caller_ids.push(mid);
            }
        }

        let mut callee_ids = Vec::new();
        let mut rows = self
            .graph
            .execute(query(callees_cypher).param("id", module_id.to_string()))
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let mid: String = row.get("mid").unwrap_or_default();
            if !mid.is_empty() && mid != module_id {
                callee_ids.push(mid);
            }
        }

        let callers = self.modules_by_ids(&caller_ids).await?;
        let callees = self.modules_by_ids(&callee_ids).await?;
        Ok((callers, callees))
    }

    /// Transitive impact over imports/calls in both directions, up to
    /// `depth` hops. Returns the reached module IDs including the seeds.
    pub async fn impacted_module_ids(
        &self,
        seeds: &[String],
        depth: usize,
    ) -> Result<Vec<String>> {
        // Cypher cannot parameterize variable-length bounds.
        let depth = depth.clamp(1, 10);
        let cypher = format!(
            "MATCH (m:Module) WHERE m.id IN $seeds \
             OPTIONAL MATCH (m)-[:IMPORTS|CALLS*1..{}]-(x) \
             WITH collect(DISTINCT m.id) + collect(DISTINCT coalesce(x.moduleId, x.id)) AS ids \
             UNWIND ids AS id \
             RETURN DISTINCT id",
            depth
        );
        let mut rows = self
            .graph
            .execute(query(&cypher).param("seeds", seeds.to_vec()))
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let id: String = row.get("id").unwrap_or_default();
            if id.starts_with("mod:") && !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Modules with the highest fan-in (imports + calls), for the
    /// architecture diagram's critical-module list.
    pub async fn critical_modules(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<(Module, usize)>> {
        let cypher = "MATCH (p:Project {id: $id})-[:HAS_MODULE]->(m:Module) \
                      OPTIONAL MATCH (other)-[r:IMPORTS|CALLS]->(m) \
                      WITH m, count(r) AS fan_in \
                      ORDER BY fan_in DESC LIMIT $limit \
                      RETURN m.json AS json, fan_in";
        let mut rows = self
            .graph
            .execute(
                query(cypher)
                    .param("id", project_id.to_string())
                    .param("limit", limit as i64),
            )
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::graph_store(e.to_string()))?
        {
            let json: String = row
                .get("json")
                .map_err(|e| Error::graph_store(e.to_string()))?;
            let fan_in: i64 = row.get("fan_in").unwrap_or(0);
            if let Ok(module) = serde_json::from_str(&json) {
                out.push((module, fan_in.max(0) as usize));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::pkg::{Project, PKG_VERSION};

    fn pkg_with_sha(sha: Option<&str>) -> Pkg {
        Pkg {
            version: PKG_VERSION.into(),
            generated_at: "2026-01-01T00:00:00Z".into(),
            git_sha: sha.map(String::from),
            project: Project {
                id: "demo".into(),
                name: "demo".into(),
                root_path: "/tmp/demo".into(),
                ..Default::default()
            },
            modules: vec![],
            symbols: vec![],
            endpoints: vec![],
            edges: vec![],
            features: vec![],
        }
    }

    #[test]
    fn cache_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = pkg_with_sha(Some("abc"));
        write_pkg_cache(tmp.path(), &pkg).unwrap();
        assert!(tmp.path().join(CACHE_FILE).exists());
        // No temp file left behind.
        assert!(!tmp.path().join("pkg.json.tmp").exists());
    }

    #[test]
    fn cache_invalid_without_git_sha() {
        // The fixture dir is not a git repo: current SHA is None, so even a
        // cached SHA cannot validate and the cache misses.
        let tmp = tempfile::tempdir().unwrap();
        let pkg = pkg_with_sha(Some("abc"));
        write_pkg_cache(tmp.path(), &pkg).unwrap();
        assert!(load_cached_pkg(tmp.path()).is_none());

        let pkg = pkg_with_sha(None);
        write_pkg_cache(tmp.path(), &pkg).unwrap();
        assert!(load_cached_pkg(tmp.path()).is_none());
    }

    #[test]
    fn corrupt_cache_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CACHE_FILE), "{not json").unwrap();
        assert!(load_cached_pkg(tmp.path()).is_none());
    }
}
