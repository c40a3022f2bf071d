//! PR creator — fork, push, and open a pull request against the code host
//!
//! Minimal REST surface: authenticate as user, check ownership, create or
//! fetch a fork, open a PR. Any hosting provider exposing this surface is
//! acceptable; the default base URL targets the GitHub API.

use repograph_core::{EditResult, Error, Plan, Result, TestResults};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Clone, Debug)]
pub struct PrResult {
    pub url: String,
    pub number: u64,
}

#[derive(Clone, Debug)]
pub struct ForkResult {
    pub clone_url: String,
    pub owner: String,
    pub html_url: String,
    pub original_url: String,
    pub already_owned: bool,
}

pub struct PrCreator {
    repo_path: PathBuf,
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Deserialize)]
struct ApiRepo {
    clone_url: String,
    html_url: String,
    fork: bool,
    #[serde(default)]
    default_branch: String,
    owner: ApiUser,
    parent: Option<Box<ApiRepo>>,
}

#[derive(Deserialize)]
struct ApiPull {
    html_url: String,
    number: u64,
}

impl PrCreator {
    pub fn new(repo_path: impl AsRef<Path>, token: Option<String>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            token,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Token absent means PR creation is skipped, not an error.
    pub fn available(&self) -> bool {
        self.token.is_some()
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token.as_deref().unwrap_or_default())
    }

    async fn api_get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("authorization", self.auth_header())
            .header("user-agent", "repograph")
            .header("accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::HostApi(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::HostApi(format!(
                "GET {}: {}",
                path,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::HostApi(e.to_string()))
    }

    async fn api_post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .header("authorization", self.auth_header())
            .header("user-agent", "repograph")
            .header("accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::HostApi(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::HostApi(format!("POST {}: {} {}", path, status, text)));
        }
        response
            .json()
            .await
            .map_err(|e| Error::HostApi(e.to_string()))
    }

    /// Ensure a writable fork exists for `(owner, repo)`. Skips when the
    /// authenticated user already owns the repo; retries the lookup on an
    /// "already exists" race.
    pub async fn fork_repository(&self, owner: &str, repo_name: &str) -> Result<ForkResult> {
        if !self.available() {
            return Err(Error::HostApi("host api token not configured".into()));
        }

        let user: ApiUser = self.api_get("/user").await?;
        let original: ApiRepo = self
            .api_get(&format!("/repos/{}/{}", owner, repo_name))
            .await?;

        if owner.eq_ignore_ascii_case(&user.login) {
            info!("repository {}/{} already owned, no fork needed", owner, repo_name);
            return Ok(ForkResult {
                clone_url: original.clone_url.clone(),
                owner: user.login,
                html_url: original.html_url,
                original_url: original.clone_url,
                already_owned: true,
            });
        }

        // An existing fork under the user wins over creating a new one.
        if let Ok(existing) = self
            .api_get::<ApiRepo>(&format!("/repos/{}/{}", user.login, repo_name))
            .await
        {
            let is_our_fork = existing.fork
                && existing
                    .parent
                    .as_ref()
                    .is_some_and(|p| p.owner.login.eq_ignore_ascii_case(owner));
            if is_our_fork {
                info!("found existing fork {}/{}", user.login, repo_name);
                return Ok(ForkResult {
                    clone_url: existing.clone_url,
                    owner: existing.owner.login,
                    html_url: existing.html_url,
                    original_url: original.clone_url,
                    already_owned: false,
                });
            }
        }

        info!("creating fork of {}/{}", owner, repo_name);
        match self
            .api_post::<ApiRepo>(
                &format!("/repos/{}/{}/forks", owner, repo_name),
                serde_json::json!({}),
            )
            .await
        {
            Ok(fork) => Ok(ForkResult {
                clone_url: fork.clone_url,
                owner: fork.owner.login,
                html_url: fork.html_url,
                original_url: original.clone_url,
                already_owned: false,
            }),
            Err(e) => {
                // Fork creation raced: retry the lookup once.
                if e.to_string().to_lowercase().contains("already exists") {
                    let fork: ApiRepo = self
                        .api_get(&format!("/repos/{}/{}", user.login, repo_name))
                        .await?;
                    return Ok(ForkResult {
                        clone_url: fork.clone_url,
                        owner: fork.owner.login,
                        html_url: fork.html_url,
                        original_url: original.clone_url,
                        already_owned: false,
                    });
                }
                Err(e)
            }
        }
    }

    /// Push the feature branch to a remote.
    pub async fn push_branch(&self, branch: &str, remote: &str) -> Result<String> {
        let output = Command::new("git")
            .args(["push", remote, branch])
            .current_dir(&self.repo_path)
            .output()
            .await
            .map_err(|e| Error::subprocess("git push", e.to_string()))?;
        if !output.status.success() {
            return Err(Error::subprocess(
                "git push",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        info!("pushed {} to {}", branch, remote);
        Ok(format!("{}/{}", remote, branch))
    }

    /// Base branch: `main`, else `master`, else the remote default.
    pub async fn base_branch(&self, owner: &str, repo_name: &str) -> String {
        for candidate in ["main", "master"] {
            let verified = Command::new("git")
                .args(["rev-parse", "--verify", &format!("origin/{}", candidate)])
                .current_dir(&self.repo_path)
                .output()
                .await;
            if verified.map(|o| o.status.success()).unwrap_or(false) {
                return candidate.to_string();
            }
        }
        match self
            .api_get::<ApiRepo>(&format!("/repos/{}/{}", owner, repo_name))
            .await
        {
            Ok(repo) if !repo.default_branch.is_empty() => repo.default_branch,
            _ => "main".to_string(),
        }
    }

    /// Open the pull request. On API failure the upstream URL is preserved
    /// in the error so the user can open the PR manually.
    pub async fn create_pr(
        &self,
        owner: &str,
        repo_name: &str,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PrResult> {
        if !self.available() {
            return Err(Error::HostApi("host api token not configured".into()));
        }
        let base = self.base_branch(owner, repo_name).await;
        let pull: ApiPull = self
            .api_post(
                &format!("/repos/{}/{}/pulls", owner, repo_name),
                serde_json::json!({
                    "title": title,
                    "body": body,
                    "head": branch,
                    "base": base,
                }),
            )
            .await
            .map_err(|e| {
                warn!("PR creation failed: {}", e);
                Error::HostApi(format!(
                    "{} (open manually at https://github.com/{}/{}/compare)",
                    e, owner, repo_name
                ))
            })?;
        info!("created PR #{}: {}", pull.number, pull.html_url);
        Ok(PrResult {
            url: pull.html_url,
            number: pull.number,
        })
    }
}

/// Parse `(owner, repo)` out of an HTTPS or SSH repository URL.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/').trim_end_matches(".git");
    let rest = trimmed
        .split_once("github.com/")
        .map(|(_, r)| r)
        .or_else(|| trimmed.split_once("github.com:").map(|(_, r)| r))
        .or_else(|| {
            // Generic host: take the last two path segments.
            let without_scheme = trimmed.split("://").last()?;
            let (_, path) = without_scheme.split_once('/')?;
            Some(path)
        })?;
    let mut parts = rest.split('/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?.to_string();
    if owner.is_empty() || repo.is_empty() {
        None
    } else {
        Some((owner, repo))
    }
}

/// PR description generated from the plan, test results, and changes.
pub fn generate_pr_description(
    plan: &Plan,
    test_results: &TestResults,
    changes: &EditResult,
) -> String {
    let files: Vec<&str> = changes.changes.iter().map(|c| c.file.as_str()).collect();
    let files_section = if files.is_empty() {
        "- No files listed".to_string()
    } else {
        files
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut description = format!(
        "## Summary\n{}\n\n## Files Changed\n{}\n\n## Testing\n\
         - Tests passed: {}\n- Tests failed: {}\n- Build success: {}\n\n\
         ## Plan Summary\nThis PR implements the following tasks:\n",
        plan.intent.description,
        files_section,
        test_results.tests_passed,
        test_results.tests_failed,
        test_results.build_success,
    );
    for task in &plan.tasks {
        description.push_str(&format!("- {}\n", task.task));
    }
    if plan.migration_required {
        description.push_str(
            "\n## Migration\nDatabase migration may be required. Please review migration steps.\n",
        );
    }
    description
        .push_str("\n## Rollback\nTo rollback, revert this branch or use `git revert <commit_sha>`\n");
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::{FileChange, ImpactSummary, Intent, IntentCategory};

    #[test]
    fn parses_repo_urls() {
        assert_eq!(
            parse_repo_url("https://github.com/acme/widget.git"),
            Some(("acme".into(), "widget".into()))
        );
        assert_eq!(
            parse_repo_url("git@github.com:acme/widget.git"),
            Some(("acme".into(), "widget".into()))
        );
        assert_eq!(
            parse_repo_url("https://github.com/acme/widget/"),
            Some(("acme".into(), "widget".into()))
        );
        assert_eq!(
            parse_repo_url("https://code.example.com/team/thing.git"),
            Some(("team".into(), "thing".into()))
        );
        assert_eq!(parse_repo_url("not a url"), None);
    }

    #[test]
    fn pr_description_sections() {
        let plan = Plan {
            plan_id: "p".into(),
            tasks: vec![],
            total_estimated_time: "1h".into(),
            migration_required: true,
            intent: Intent::minimal(IntentCategory::CodeChange, "Add logout endpoint"),
            impact_summary: ImpactSummary::default(),
        };
        let tests = TestResults {
            tests_passed: 12,
            tests_failed: 0,
            build_success: true,
            ..Default::default()
        };
        let mut changes = EditResult::default();
        changes.changes.push(FileChange {
            file: "routes/auth.py".into(),
            status: "modified".into(),
            diff: String::new(),
            task_id: 1,
        });

        let body = generate_pr_description(&plan, &tests, &changes);
        assert!(body.contains("## Summary"));
        assert!(body.contains("Add logout endpoint"));
        assert!(body.contains("- routes/auth.py"));
        assert!(body.contains("Tests passed: 12"));
        assert!(body.contains("## Migration"));
        assert!(body.contains("## Rollback"));
    }

    #[test]
    fn creator_without_token_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let creator = PrCreator::new(tmp.path(), None);
        assert!(!creator.available());
    }
}
