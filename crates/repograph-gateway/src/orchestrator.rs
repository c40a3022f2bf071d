//! Agent orchestrator — drives the workflow state machine per session
//!
//! IDLE → INTENT → LOAD_REPO → (QUERY | DIAGRAM | IMPACT → PLAN →
//! [AWAIT_APPROVAL] → EDIT → TEST → VERIFY → [PR]) → IDLE. Recoverable
//! failures surface as events and return the session to IDLE; only a
//! phase with no meaningful input aborts the turn.

use crate::session::{Session, SessionRegistry};
use dashmap::DashMap;
use repograph_agents::pr::{generate_pr_description, parse_repo_url};
use repograph_agents::{
    verifier::verify_acceptance, CodeEditor, DiagramGenerator, ImpactAnalyzer, IntentRouter,
    Planner, PrCreator, QueryHandler, TestRunner,
};
use repograph_core::pkg::{Module, Pkg};
use repograph_core::{
    AgentConfig, AgentUpdate, Error, Intent, IntentCategory, Plan, Result, UpdateKind,
};
use repograph_llm::SharedOracle;
use repograph_pkg::GraphStore;
use repograph_query::QueryEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Orchestrator {
    config: AgentConfig,
    oracle: SharedOracle,
    graph: Option<Arc<GraphStore>>,
    pub sessions: Arc<SessionRegistry>,
    /// Serializes clone attempts per target directory.
    clone_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl Orchestrator {
    pub fn new(
        config: AgentConfig,
        oracle: SharedOracle,
        graph: Option<Arc<GraphStore>>,
    ) -> Self {
        Self {
            config,
            oracle,
            graph,
            sessions: Arc::new(SessionRegistry::new()),
            clone_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Entry point for a `chat_message` event.
    pub async fn process_user_request(
        &self,
        session: &Arc<Session>,
        message: &str,
        repo_url: Option<String>,
    ) {
        let _turn = session.turn_lock.lock().await;

        session
            .status("intent_extraction", "Processing your request...")
            .await;

        // Remember a provided repo URL for the rest of the conversation.
        if let Some(url) = &repo_url {
            session.state.write().await.repo_url = Some(url.clone());
        }

        let router = IntentRouter::new(self.oracle.clone());
        let intent = router.extract_intent(message).await;
        if session.cancel.is_cancelled() {
            return;
        }
        session
            .log(
                "intent_extraction",
                serde_json::json!({
                    "intent": intent,
                    "message": format!("Intent extracted: {}", intent.intent),
                }),
            )
            .await;
        session.state.write().await.current_intent = Some(intent.clone());

        // Every path needs a PKG; code changes additionally need a tree.
        let pkg = match self.ensure_repo_loaded(session).await {
            Ok(pkg) => pkg,
            Err(e) => {
                session.error(e.stage_hint(), &e.to_string()).await;
                return;
            }
        };

        match intent.intent_category {
            IntentCategory::InformationalQuery => {
                self.handle_query(session, &intent, message, pkg).await;
            }
            IntentCategory::DiagramRequest => {
                self.handle_diagram(session, &intent, message, pkg).await;
            }
            IntentCategory::CodeChange => {
                let repo_path = session.state.read().await.repo_path.clone();
                match repo_path {
                    Some(repo_path) => {
                        self.execute_workflow(session, &intent, pkg, &repo_path).await;
                    }
                    None => {
                        session
                            .status(
                                "waiting",
                                "Please provide a repository URL to proceed with code changes",
                            )
                            .await;
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // LOAD_REPO
    // -----------------------------------------------------------------------

    /// Resolution order: session cache → graph DB by computed project ID →
    /// clone (skip if present) → build or reuse PKG → populate session.
    async fn ensure_repo_loaded(&self, session: &Arc<Session>) -> Result<Arc<Pkg>> {
        if let Some(pkg) = session.state.read().await.pkg.clone() {
            return Ok(pkg);
        }

        let repo_url = session
            .state
            .read()
            .await
            .repo_url
            .clone()
            .ok_or_else(|| Error::PkgError("no repository URL for this session".into()))?;

        let repo_name = repo_name_from_url(&repo_url);
        let project_id = repo_name.clone();

        // Graph DB before cloning: a stored PKG answers read-only requests
        // without touching the network.
        if let Some(graph) = &self.graph {
            if graph.check_stored(&project_id).await {
                session
                    .status("pkg_loading", "Loading knowledge graph from database...")
                    .await;
                match graph.load_pkg(&project_id).await {
                    Ok(pkg) => {
                        info!(
                            "PKG loaded from graph db: {} ({} modules)",
                            project_id,
                            pkg.modules.len()
                        );
                        let pkg = Arc::new(pkg);
                        let mut state = session.state.write().await;
                        state.pkg = Some(pkg.clone());
                        if state.repo_path.is_none() {
                            let root = PathBuf::from(&pkg.project.root_path);
                            if root.exists() {
                                state.repo_path = Some(root);
                            }
                        }
                        return Ok(pkg);
                    }
                    Err(e) => warn!("graph db PKG load failed: {}", e),
                }
            }
        }

        // Clone (or reuse) the working tree.
        session
            .status("repo_loading", &format!("Loading repository: {}", repo_url))
            .await;
        let repo_path = self.clone_repo(session, &repo_url, &repo_name).await?;

        // Build or reuse the PKG.
        session
            .status("pkg_generation", "Generating knowledge graph...")
            .await;
        let fan_threshold = self.config.pkg_fan_threshold;
        let build_path = repo_path.clone();
        let pkg = tokio::task::spawn_blocking(move || {
            repograph_pkg::generate_pkg(&build_path, fan_threshold, true)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))??;

        // Mirror into the graph DB; a failed store is a degraded path only.
        if let Some(graph) = &self.graph {
            if let Err(e) = graph.store_pkg(&pkg).await {
                warn!("graph db store failed (continuing): {}", e);
                session
                    .status("pkg_generation", "Graph database unavailable, continuing in-memory")
                    .await;
            }
        }

        session
            .status("pkg_generation", "Knowledge graph generated successfully")
            .await;

        let pkg = Arc::new(pkg);
        let mut state = session.state.write().await;
        state.repo_path = Some(repo_path);
        state.pkg = Some(pkg.clone());
        Ok(pkg)
    }

    async fn clone_repo(
        &self,
        session: &Arc<Session>,
        repo_url: &str,
        repo_name: &str,
    ) -> Result<PathBuf> {
        let clone_root = &self.config.clone_root;
        tokio::fs::create_dir_all(clone_root).await?;
        let target = clone_root.join(repo_name);

        // Sessions cloning the same repo serialize on a per-path lock.
        let lock = self
            .clone_locks
            .entry(target.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if target.exists() {
            info!("repo already present at {}, skipping clone", target.display());
            return Ok(target);
        }

        session.log("repo_loading", serde_json::json!({ "message": "Cloning repository..." })).await;

        let output = Command::new("git")
            .args(["clone", repo_url])
            .arg(&target)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::CloneFailed {
                url: repo_url.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::CloneFailed {
                url: repo_url.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!("cloned {} into {}", repo_url, target.display());
        Ok(target)
    }

    // -----------------------------------------------------------------------
    // Read-only paths
    // -----------------------------------------------------------------------

    async fn handle_query(
        &self,
        session: &Arc<Session>,
        _intent: &Intent,
        message: &str,
        pkg: Arc<Pkg>,
    ) {
        session
            .status("query_handling", "Processing your question...")
            .await;
        let engine = QueryEngine::new(pkg).with_graph(self.graph.clone());
        let handler = QueryHandler::new(&engine, self.oracle.clone());
        let response = handler.answer_query(message).await;
        session
            .emit(AgentUpdate::new(
                UpdateKind::QueryResponse,
                "query_handling",
                serde_json::json!({
                    "answer": response.answer,
                    "references": response.references,
                    "metadata": response.metadata,
                }),
                &session.session_id,
            ))
            .await;
    }

    async fn handle_diagram(
        &self,
        session: &Arc<Session>,
        intent: &Intent,
        message: &str,
        pkg: Arc<Pkg>,
    ) {
        session
            .status("diagram_generation", "Generating diagram...")
            .await;
        let engine = QueryEngine::new(pkg).with_graph(self.graph.clone());
        let generator = DiagramGenerator::new(&engine, self.oracle.clone());
        let response = generator.generate_diagram(intent, message).await;
        session
            .emit(AgentUpdate::new(
                UpdateKind::DiagramResponse,
                "diagram_generation",
                serde_json::to_value(&response).unwrap_or_default(),
                &session.session_id,
            ))
            .await;
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    async fn execute_workflow(
        &self,
        session: &Arc<Session>,
        intent: &Intent,
        pkg: Arc<Pkg>,
        repo_path: &Path,
    ) {
        if session.cancel.is_cancelled() {
            return;
        }

        // Phase: PKG query for seed modules.
        session
            .status("pkg_query", "Querying knowledge graph for impacted modules...")
            .await;
        let engine = QueryEngine::new(pkg.clone()).with_graph(self.graph.clone());
        let seeds = self.seed_modules(&engine, intent).await;
        session
            .log(
                "pkg_query",
                serde_json::json!({ "message": format!("Found {} seed modules", seeds.len()) }),
            )
            .await;

        // Phase: impact analysis.
        session
            .status("impact_analysis", "Analyzing change impact...")
            .await;
        let seed_ids: Vec<String> = seeds.iter().map(|m| m.id.clone()).collect();
        let analyzer = ImpactAnalyzer::new(&engine);
        let impact = analyzer.analyze_impact(intent, &seed_ids).await;
        session
            .log(
                "impact_analysis",
                serde_json::json!({
                    "message": format!("Impact analysis complete. Risk: {:?}", impact.risk_score),
                    "impact": impact,
                }),
            )
            .await;

        // Phase: planning.
        session.status("planning", "Generating change plan...").await;
        let planner = Planner::new(self.oracle.clone());
        let plan = planner
            .generate_plan(intent, &impact, &intent.constraints, Some(&pkg))
            .await;
        session
            .log(
                "planning",
                serde_json::json!({
                    "message": format!("Plan generated with {} tasks", plan.tasks.len()),
                }),
            )
            .await;

        // Approval gate.
        let requires_approval =
            intent.human_approval || impact.requires_approval || self.config.approval_required;

        {
            let mut state = session.state.write().await;
            state.current_plan = Some(plan.clone());
            state.pending_approval = requires_approval.then(|| plan.plan_id.clone());
        }

        if requires_approval {
            session
                .emit(AgentUpdate::new(
                    UpdateKind::ApprovalRequest,
                    "planning",
                    serde_json::json!({
                        "plan_id": plan.plan_id,
                        "plan": plan,
                        "intent": intent,
                        "impact": impact,
                        "message": "Please review and approve the plan to proceed",
                    }),
                    &session.session_id,
                ))
                .await;
            return; // AWAIT_APPROVAL: resumed by approve_plan.
        }

        self.execute_plan(session, &plan, repo_path, pkg).await;
    }

    /// Seed modules from intent tag hints, falling back to description
    /// keywords; downstream phases tolerate an empty seed set.
    async fn seed_modules(&self, engine: &QueryEngine, intent: &Intent) -> Vec<Module> {
        let mut tags = intent.target_modules.clone();
        if tags.is_empty() {
            let description = intent.description.to_lowercase();
            for tag in ["auth", "login", "user", "payment", "order", "api"] {
                if description.contains(tag) {
                    tags.push(tag.to_string());
                }
            }
        }

        let mut seeds: Vec<Module> = Vec::new();
        for tag in &tags {
            for module in engine.modules_by_tag(tag).await {
                if !seeds.iter().any(|m| m.id == module.id) {
                    seeds.push(module);
                }
            }
            for module in engine.modules_by_path_pattern(&format!("*{}*", tag)) {
                if !seeds.iter().any(|m| m.id == module.id) {
                    seeds.push(module);
                }
            }
        }

        // Target-file hints from the intent map directly.
        for file in &intent.target_files {
            for module in engine.modules_by_filename(file) {
                if !seeds.iter().any(|m| m.id == module.id) {
                    seeds.push(module);
                }
            }
        }
        seeds
    }

    async fn execute_plan(
        &self,
        session: &Arc<Session>,
        plan: &Plan,
        repo_path: &Path,
        pkg: Arc<Pkg>,
    ) {
        if session.cancel.is_cancelled() {
            return;
        }

        // Phase: EDIT.
        session.status("editing", "Applying code changes...").await;
        let editor = CodeEditor::new(
            repo_path,
            self.oracle.clone(),
            &self.config.git_user_name,
            &self.config.git_user_email,
        );

        let branch_name = format!("feat/agent-{}", &plan.plan_id[..plan.plan_id.len().min(8)]);
        if let Err(e) = editor.create_branch(&branch_name).await {
            session.error("editing", &e.to_string()).await;
            return;
        }
        session
            .log(
                "editing",
                serde_json::json!({ "message": format!("Created branch: {}", branch_name) }),
            )
            .await;

        let edit_result = editor.apply_edits(plan, Some(&pkg)).await;
        for change in &edit_result.changes {
            session
                .emit(AgentUpdate::new(
                    UpdateKind::CodeChange,
                    "editing",
                    serde_json::json!({
                        "file": change.file,
                        "diff": change.diff,
                        "status": change.status,
                    }),
                    &session.session_id,
                ))
                .await;
        }
        for error in &edit_result.errors {
            session
                .error("editing", &format!("{}: {}", error.file, error.error))
                .await;
        }

        if edit_result.changes.is_empty() {
            session
                .status("editing", "No changes were applied; stopping before tests")
                .await;
            return;
        }

        if let Err(e) = editor
            .commit_changes(&format!("agent: {}", plan.intent.description))
            .await
        {
            warn!("commit failed: {}", e);
        }

        // Phase: TEST.
        if session.cancel.is_cancelled() {
            return;
        }
        session.status("testing", "Running tests...").await;
        let runner = TestRunner::new(
            repo_path,
            self.config.test_timeout_secs,
            self.config.lint_timeout_secs,
        );
        let test_results = runner.run_tests().await;
        session
            .emit(AgentUpdate::new(
                UpdateKind::TestResult,
                "testing",
                serde_json::json!({
                    "results": test_results,
                    "message": format!(
                        "Tests completed: {} passed, {} failed",
                        test_results.tests_passed, test_results.tests_failed
                    ),
                }),
                &session.session_id,
            ))
            .await;

        // Phase: VERIFY.
        session.status("verification", "Verifying changes...").await;
        let (lint, _) = runner.run_linter().await;
        let (typecheck, _) = runner.run_typecheck().await;
        let verification = verify_acceptance(&test_results, lint, typecheck);
        session
            .log(
                "verification",
                serde_json::json!({
                    "verification": verification,
                    "message": "Verification complete",
                }),
            )
            .await;

        // Phase: PR.
        if verification.ready_for_pr {
            self.create_pr_phase(session, plan, repo_path, &branch_name, &test_results, &edit_result)
                .await;
        } else {
            session
                .emit(AgentUpdate::new(
                    UpdateKind::Summary,
                    "verification",
                    serde_json::json!({
                        "message": "Changes completed but not ready for PR",
                        "verification": verification,
                        "test_results": test_results,
                    }),
                    &session.session_id,
                ))
                .await;
        }
    }

    async fn create_pr_phase(
        &self,
        session: &Arc<Session>,
        plan: &Plan,
        repo_path: &Path,
        branch_name: &str,
        test_results: &repograph_core::TestResults,
        edit_result: &repograph_core::EditResult,
    ) {
        let creator = PrCreator::new(repo_path, self.config.host_api_token.clone());
        if !creator.available() {
            // Missing auth skips the phase; it is not an error.
            session
                .status("pr_creation", "Host API token not configured, skipping PR creation")
                .await;
            return;
        }

        session
            .status("pr_creation", "Creating pull request...")
            .await;

        let repo_url = session.state.read().await.repo_url.clone().unwrap_or_default();
        let Some((owner, repo_name)) = parse_repo_url(&repo_url) else {
            session
                .error("pr_creation", "Could not parse repository URL")
                .await;
            return;
        };

        let result: Result<_> = async {
            creator.fork_repository(&owner, &repo_name).await?;
            creator.push_branch(branch_name, "origin").await?;
            let description = generate_pr_description(plan, test_results, edit_result);
            creator
                .create_pr(
                    &owner,
                    &repo_name,
                    branch_name,
                    &plan.intent.description,
                    &description,
                )
                .await
        }
        .await;

        match result {
            Ok(pr) => {
                session
                    .emit(AgentUpdate::new(
                        UpdateKind::Summary,
                        "pr_creation",
                        serde_json::json!({
                            "pr_url": pr.url,
                            "pr_number": pr.number,
                            "message": "Pull request created successfully",
                        }),
                        &session.session_id,
                    ))
                    .await;
            }
            Err(e) => {
                session.error("pr_creation", &e.to_string()).await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Approval gate
    // -----------------------------------------------------------------------

    pub async fn approve_plan(&self, session_id: &str, plan_id: Option<&str>) {
        let Some(session) = self.sessions.get(session_id) else {
            warn!("approve_plan for unknown session {}", session_id);
            return;
        };
        let _turn = session.turn_lock.lock().await;

        let (plan, repo_path, pkg) = {
            let state = session.state.read().await;
            (
                state.current_plan.clone(),
                state.repo_path.clone(),
                state.pkg.clone(),
            )
        };

        let Some(plan) = plan else {
            session.error("approval", "Plan not found").await;
            return;
        };
        if let Some(plan_id) = plan_id {
            if plan.plan_id != plan_id {
                session.error("approval", "Plan not found").await;
                return;
            }
        }
        let (Some(repo_path), Some(pkg)) = (repo_path, pkg) else {
            session.error("approval", "Repository path not found").await;
            return;
        };

        session.state.write().await.pending_approval = None;
        session
            .status("approval", "Plan approved, proceeding with execution...")
            .await;
        self.execute_plan(&session, &plan, &repo_path, pkg).await;
    }

    pub async fn reject_plan(&self, session_id: &str, plan_id: Option<&str>, reason: Option<&str>) {
        let Some(session) = self.sessions.get(session_id) else {
            warn!("reject_plan for unknown session {}", session_id);
            return;
        };
        {
            let mut state = session.state.write().await;
            state.pending_approval = None;
            state.current_plan = None;
        }
        info!(
            "plan {:?} rejected for session {}: {}",
            plan_id,
            session_id,
            reason.unwrap_or("no reason provided")
        );
        session
            .status(
                "approval",
                &format!(
                    "Plan rejected ({}). Please provide new instructions.",
                    reason.unwrap_or("no reason provided")
                ),
            )
            .await;
    }
}

fn repo_name_from_url(repo_url: &str) -> String {
    repo_url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit(['/', ':'])
        .next()
        .unwrap_or("repo")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_extraction() {
        assert_eq!(
            repo_name_from_url("https://github.com/acme/widget.git"),
            "widget"
        );
        assert_eq!(repo_name_from_url("git@github.com:acme/widget.git"), "widget");
        assert_eq!(repo_name_from_url("https://host/x/thing/"), "thing");
    }
}
