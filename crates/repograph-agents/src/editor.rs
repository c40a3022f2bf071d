//! Code editor — applies plan tasks to a working tree on a feature branch
//!
//! The editor never invents code itself: the oracle proposes full file
//! contents, the validator gates them, and every write is atomic with a
//! unified diff computed against the pre-image.

use crate::validator::validate_content;
use repograph_core::pkg::Pkg;
use repograph_core::{
    EditResult, Error, FileChange, FileError, FileValidation, Plan, PlanTask, Result,
};
use repograph_llm::provider::strip_code_fences;
use repograph_llm::{LlmRequest, SharedOracle};
use similar::TextDiff;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Keyword hints that mark a missing file as intentionally new.
const CREATE_HINTS: &[&str] = &["create", "new", "add new file", "generate", "implement"];

pub struct CodeEditor {
    repo_path: PathBuf,
    oracle: SharedOracle,
    git_user_name: String,
    git_user_email: String,
}

impl CodeEditor {
    pub fn new(
        repo_path: impl AsRef<Path>,
        oracle: SharedOracle,
        git_user_name: impl Into<String>,
        git_user_email: impl Into<String>,
    ) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            oracle,
            git_user_name: git_user_name.into(),
            git_user_email: git_user_email.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await
            .map_err(|e| Error::subprocess(format!("git {}", args.join(" ")), e.to_string()))?;
        if !output.status.success() {
            return Err(Error::subprocess(
                format!("git {}", args.join(" ")),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Create or check out the feature branch for a plan.
    pub async fn create_branch(&self, branch_name: &str) -> Result<String> {
        if !self.repo_path.join(".git").exists() {
            warn!("not a git repository, skipping branch creation");
            return Ok(branch_name.to_string());
        }
        let exists = self
            .git(&["rev-parse", "--verify", branch_name])
            .await
            .is_ok();
        if exists {
            info!("branch {} exists, checking it out", branch_name);
            self.git(&["checkout", branch_name]).await?;
        } else {
            self.git(&["checkout", "-b", branch_name]).await?;
            info!("created branch {}", branch_name);
        }
        Ok(branch_name.to_string())
    }

    /// Apply every task in the plan. Per-file failures mark the task failed
    /// and the rest proceed.
    pub async fn apply_edits(&self, plan: &Plan, pkg: Option<&Pkg>) -> EditResult {
        let framework = pkg
            .and_then(|p| p.project.frameworks.first().cloned())
            .unwrap_or_else(|| "unknown".to_string());

        let mut result = EditResult::default();

        for task in &plan.tasks {
            for file in &task.files {
                match self.edit_file(file, task, pkg, &framework).await {
                    Ok(EditOutcome::Written { diff, validation, created }) => {
                        result.changes.push(FileChange {
                            file: file.clone(),
                            status: if created { "created" } else { "modified" }.to_string(),
                            diff,
                            task_id: task.task_id,
                        });
                        result.validation_results.push(validation);
                    }
                    Ok(EditOutcome::Skipped { reason }) => {
                        result.errors.push(FileError {
                            file: file.clone(),
                            error: reason,
                            task_id: task.task_id,
                        });
                    }
                    Ok(EditOutcome::Rejected { validation }) => {
                        result.errors.push(FileError {
                            file: file.clone(),
                            error: format!(
                                "validation failed: {}",
                                validation.errors.join("; ")
                            ),
                            task_id: task.task_id,
                        });
                        result.validation_results.push(validation);
                    }
                    Err(e) => {
                        result.errors.push(FileError {
                            file: file.clone(),
                            error: e.to_string(),
                            task_id: task.task_id,
                        });
                    }
                }
            }
        }

        result.total_files = result.changes.len();
        result.success = result.errors.is_empty();
        result
    }

    async fn edit_file(
        &self,
        rel_path: &str,
        task: &PlanTask,
        pkg: Option<&Pkg>,
        framework: &str,
    ) -> Result<EditOutcome> {
        let full_path = self.repo_path.join(rel_path);
        let original = match std::fs::read_to_string(&full_path) {
            Ok(content) => Some(content),
            Err(_) => None,
        };

        // A path that does not exist is either an intentional creation or
        // a planner mistake; the task text decides.
        if original.is_none() && !wants_creation(task) {
            return Ok(EditOutcome::Skipped {
                reason: "File not found".to_string(),
            });
        }

        let Some(oracle) = &self.oracle else {
            return Ok(EditOutcome::Skipped {
                reason: "LLM unavailable, no edits applied".to_string(),
            });
        };

        let context = pkg
            .map(|p| build_module_context(p, rel_path))
            .unwrap_or_default();
        let prompt = build_edit_prompt(rel_path, original.as_deref(), task, &context, framework);

        let response = oracle
            .complete(LlmRequest::new(prompt).with_temperature(0.1))
            .await
            .map_err(|e| Error::llm("editor", e.to_string()))?;
        let proposed = strip_code_fences(&response);

        if let Some(original) = &original {
            if proposed.trim() == original.trim() {
                return Ok(EditOutcome::Skipped {
                    reason: "No changes applied".to_string(),
                });
            }
        }

        let validation = validate_content(rel_path, task.task_id, &proposed, framework);
        if !validation.valid {
            return Ok(EditOutcome::Rejected { validation });
        }
        if !validation.warnings.is_empty() {
            warn!("validation warnings for {}: {:?}", rel_path, validation.warnings);
        }

        // Atomic write: temp file in the same directory, then rename.
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = full_path.with_extension("agent-tmp");
        std::fs::write(&tmp_path, &proposed)?;
        std::fs::rename(&tmp_path, &full_path)?;
        debug!("wrote {} ({} bytes)", rel_path, proposed.len());

        let pre_image = original.as_deref().unwrap_or("");
        let diff = TextDiff::from_lines(pre_image, proposed.as_str())
            .unified_diff()
            .header(rel_path, rel_path)
            .to_string();

        Ok(EditOutcome::Written {
            diff,
            validation,
            created: original.is_none(),
        })
    }

    /// Unified diff of the whole working tree.
    pub async fn generate_diff(&self) -> String {
        self.git(&["diff"]).await.unwrap_or_default()
    }

    /// Stage everything and commit with the configured identity.
    pub async fn commit_changes(&self, message: &str) -> Result<String> {
        if !self.repo_path.join(".git").exists() {
            warn!("not a git repository, skipping commit");
            return Ok(String::new());
        }
        self.git(&["config", "user.name", &self.git_user_name])
            .await?;
        self.git(&["config", "user.email", &self.git_user_email])
            .await?;
        self.git(&["add", "-A"]).await?;
        self.git(&["commit", "-m", message]).await?;
        let sha = self.git(&["rev-parse", "HEAD"]).await?;
        info!("committed {}", sha);
        Ok(sha)
    }
}

enum EditOutcome {
    Written {
        diff: String,
        validation: FileValidation,
        created: bool,
    },
    Skipped {
        reason: String,
    },
    Rejected {
        validation: FileValidation,
    },
}

fn wants_creation(task: &PlanTask) -> bool {
    let haystack = format!(
        "{} {} {}",
        task.task.to_lowercase(),
        task.changes.join(" ").to_lowercase(),
        task.notes.to_lowercase()
    );
    CREATE_HINTS.iter().any(|hint| haystack.contains(hint))
}

/// PKG-derived context for the edit prompt: the module's patterns, up to
/// three related modules, and the signatures of up to three related symbols.
fn build_module_context(pkg: &Pkg, rel_path: &str) -> String {
    let normalized = rel_path.replace('\\', "/");
    let filename = normalized.rsplit('/').next().unwrap_or(&normalized);

    let module = pkg
        .modules
        .iter()
        .find(|m| m.path == normalized)
        .or_else(|| {
            pkg.modules
                .iter()
                .find(|m| m.path.rsplit('/').next() == Some(filename))
        });
    let Some(module) = module else {
        return String::new();
    };

    let mut parts = Vec::new();
    if let Some(framework) = pkg.project.frameworks.first() {
        parts.push(format!("- Framework: {}", framework));
    }
    parts.push(format!(
        "- Import style: {:?}, export style: {:?}",
        module.code_patterns.import_style, module.code_patterns.export_style
    ));
    if !module.code_patterns.decorators.is_empty() {
        parts.push(format!(
            "- Decorators in use: {}",
            module.code_patterns.decorators.join(", ")
        ));
    }
    if let Some(naming) = &pkg.project.metadata.code_style.naming_convention {
        parts.push(format!("- Naming convention: {}", naming));
    }

    let related: Vec<&str> = module
        .imports
        .iter()
        .filter_map(|id| pkg.modules.iter().find(|m| &m.id == id))
        .map(|m| m.path.as_str())
        .take(3)
        .collect();
    if !related.is_empty() {
        parts.push(format!("- Related modules: {}", related.join(", ")));
    }

    let signatures: Vec<String> = module
        .exports
        .iter()
        .filter_map(|id| pkg.symbols.iter().find(|s| &s.id == id))
        .map(|s| s.signature.clone())
        .take(3)
        .collect();
    if !signatures.is_empty() {
        parts.push(format!("- Type information: {}", signatures.join(", ")));
    }

    parts.join("\n")
}

fn build_edit_prompt(
    rel_path: &str,
    original: Option<&str>,
    task: &PlanTask,
    context: &str,
    framework: &str,
) -> String {
    let changes = task
        .changes
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    let framework_requirements = match framework.to_lowercase().as_str() {
        "flask" => "This is a Flask project: write Python, use Blueprints for routes, \
                    and follow Flask request/response patterns.",
        "angular" => "This is an Angular project: write TypeScript (.ts, never .tsx), \
                      use @Component/@Injectable decorators and Angular module imports.",
        _ => "Follow the language and conventions implied by the file extension.",
    };

    match original {
        Some(content) => format!(
            "You are a code-edit assistant. Given:\n\
             - File path: {path}\n\
             - Current file content:\n<<<\n{content}\n>>>\n\
             - Edit instructions:\n{changes}\n\
             {context}\n{framework_requirements}\n\
             Apply the edits precisely. Return ONLY the modified file content \
             (no prose, no explanations). Preserve code style and formatting. \
             Make minimal, targeted changes.",
            path = rel_path,
            content = content,
            changes = changes,
            context = context,
            framework_requirements = framework_requirements,
        ),
        None => format!(
            "You are a code-edit assistant. Create a new file.\n\
             - File path: {path}\n\
             - Requirements:\n{changes}\n\
             - Task: {task}\n\
             {context}\n{framework_requirements}\n\
             Return ONLY the complete file content (no prose, no explanations).",
            path = rel_path,
            changes = changes,
            task = task.task,
            context = context,
            framework_requirements = framework_requirements,
        ),
    }
}
