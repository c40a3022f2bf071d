//! Test runner — language-appropriate tests, lint, and typecheck with
//! timeouts and output parsing

use regex::Regex;
use repograph_core::{CheckOutcome, TestResults};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectLanguage {
    Python,
    TypeScript,
    Java,
    CSharp,
    Unknown,
}

pub struct TestRunner {
    repo_path: PathBuf,
    language: ProjectLanguage,
    test_timeout: Duration,
    check_timeout: Duration,
}

impl TestRunner {
    pub fn new(repo_path: impl AsRef<Path>, test_timeout_secs: u64, check_timeout_secs: u64) -> Self {
        let repo_path = repo_path.as_ref().to_path_buf();
        let language = detect_project_language(&repo_path);
        debug!("test runner language: {:?}", language);
        Self {
            repo_path,
            language,
            test_timeout: Duration::from_secs(test_timeout_secs),
            check_timeout: Duration::from_secs(check_timeout_secs),
        }
    }

    pub fn language(&self) -> ProjectLanguage {
        self.language
    }

    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> RunOutcome {
        let command_line = format!("{} {}", program, args.join(" "));
        debug!("running: {}", command_line);

        let child = Command::new(program)
            .args(args)
            .current_dir(&self.repo_path)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => RunOutcome::Finished {
                exit_code: output.status.code().unwrap_or(-1),
                output: format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            },
            Ok(Err(e)) => RunOutcome::Unavailable {
                message: format!("{}: {}", command_line, e),
            },
            Err(_) => {
                warn!("{} timed out after {:?}", command_line, timeout);
                RunOutcome::TimedOut
            }
        }
    }

    /// Run the project's test suite.
    pub async fn run_tests(&self) -> TestResults {
        let outcome = match self.language {
            ProjectLanguage::Python => {
                let first = self
                    .run("pytest", &["-q", "--tb=short"], self.test_timeout)
                    .await;
                if matches!(first, RunOutcome::Unavailable { .. }) {
                    self.run(
                        "python",
                        &["-m", "pytest", "-q", "--tb=short"],
                        self.test_timeout,
                    )
                    .await
                } else {
                    first
                }
            }
            ProjectLanguage::TypeScript => self.run("npm", &["test"], self.test_timeout).await,
            ProjectLanguage::Java => {
                if self.repo_path.join("pom.xml").exists() {
                    self.run("mvn", &["test"], self.test_timeout).await
                } else {
                    self.run("./gradlew", &["test"], self.test_timeout).await
                }
            }
            ProjectLanguage::CSharp => self.run("dotnet", &["test"], self.test_timeout).await,
            ProjectLanguage::Unknown => {
                return TestResults {
                    test_output: "Language not detected or not supported".to_string(),
                    error: Some("Unsupported language".to_string()),
                    ..Default::default()
                }
            }
        };

        match outcome {
            RunOutcome::Finished { exit_code, output } => {
                let (passed, failed) = parse_test_output(self.language, &output);
                info!(
                    "tests finished: {} passed, {} failed (exit {})",
                    passed, failed, exit_code
                );
                TestResults {
                    tests_passed: passed,
                    tests_failed: failed,
                    test_output: output,
                    build_success: exit_code == 0,
                    exit_code: Some(exit_code),
                    error: None,
                }
            }
            RunOutcome::TimedOut => TestResults {
                test_output: "Test execution timed out".to_string(),
                build_success: false,
                error: Some("Timeout".to_string()),
                ..Default::default()
            },
            RunOutcome::Unavailable { message } => TestResults {
                test_output: message.clone(),
                build_success: false,
                error: Some(message),
                ..Default::default()
            },
        }
    }

    /// Run the linter. Softens to `Skipped` when no tool is available.
    pub async fn run_linter(&self) -> (CheckOutcome, String) {
        let outcome = match self.language {
            ProjectLanguage::Python => {
                self.run("pylint", &["--errors-only", "."], self.check_timeout)
                    .await
            }
            ProjectLanguage::TypeScript => {
                self.run("npx", &["eslint", "."], self.check_timeout).await
            }
            _ => {
                return (
                    CheckOutcome::Skipped,
                    "Linter not configured for this language".to_string(),
                )
            }
        };
        normalize_check(outcome)
    }

    /// Run the type checker. Softens to `Skipped` when no tool is available.
    pub async fn run_typecheck(&self) -> (CheckOutcome, String) {
        let outcome = match self.language {
            ProjectLanguage::Python => self.run("mypy", &["."], self.check_timeout).await,
            ProjectLanguage::TypeScript => {
                self.run("npx", &["tsc", "--noEmit"], self.check_timeout)
                    .await
            }
            _ => {
                return (
                    CheckOutcome::Skipped,
                    "Type checker not configured for this language".to_string(),
                )
            }
        };
        normalize_check(outcome)
    }
}

enum RunOutcome {
    Finished { exit_code: i32, output: String },
    TimedOut,
    Unavailable { message: String },
}

fn normalize_check(outcome: RunOutcome) -> (CheckOutcome, String) {
    match outcome {
        RunOutcome::Finished { exit_code: 0, output } => (CheckOutcome::Passed, output),
        RunOutcome::Finished { output, .. } => (CheckOutcome::Failed, output),
        RunOutcome::TimedOut => (CheckOutcome::Failed, "Timeout".to_string()),
        RunOutcome::Unavailable { message } => (CheckOutcome::Skipped, message),
    }
}

/// Detect the project language from conventional files.
pub fn detect_project_language(repo_path: &Path) -> ProjectLanguage {
    if repo_path.join("package.json").exists() {
        ProjectLanguage::TypeScript
    } else if repo_path.join("requirements.txt").exists()
        || repo_path.join("setup.py").exists()
        || repo_path.join("pyproject.toml").exists()
    {
        ProjectLanguage::Python
    } else if repo_path.join("pom.xml").exists() || repo_path.join("build.gradle").exists() {
        ProjectLanguage::Java
    } else if std::fs::read_dir(repo_path)
        .map(|entries| {
            entries.filter_map(|e| e.ok()).any(|e| {
                e.path().extension().and_then(|x| x.to_str()) == Some("csproj")
            })
        })
        .unwrap_or(false)
    {
        ProjectLanguage::CSharp
    } else {
        ProjectLanguage::Unknown
    }
}

fn pytest_re() -> (&'static Regex, &'static Regex) {
    static PASSED: OnceLock<Regex> = OnceLock::new();
    static FAILED: OnceLock<Regex> = OnceLock::new();
    (
        PASSED.get_or_init(|| Regex::new(r"(\d+)\s+passed").unwrap()),
        FAILED.get_or_init(|| Regex::new(r"(\d+)\s+failed").unwrap()),
    )
}

/// Parse pass/fail counts from tool output, per language.
pub fn parse_test_output(language: ProjectLanguage, output: &str) -> (usize, usize) {
    match language {
        ProjectLanguage::Python => {
            let (passed_re, failed_re) = pytest_re();
            let passed = passed_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            let failed = failed_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            (passed, failed)
        }
        ProjectLanguage::TypeScript => {
            static PASSED: OnceLock<Regex> = OnceLock::new();
            static FAILED: OnceLock<Regex> = OnceLock::new();
            let passed_re =
                PASSED.get_or_init(|| Regex::new(r"(?i)Tests:.*?(\d+)\s+passed").unwrap());
            let failed_re = FAILED.get_or_init(|| Regex::new(r"(?i)(\d+)\s+failed").unwrap());
            let passed = passed_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            let failed = failed_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            (passed, failed)
        }
        ProjectLanguage::Java => {
            static TOTAL: OnceLock<Regex> = OnceLock::new();
            static FAILURES: OnceLock<Regex> = OnceLock::new();
            let total_re = TOTAL.get_or_init(|| Regex::new(r"(?i)Tests run:\s*(\d+)").unwrap());
            let failures_re =
                FAILURES.get_or_init(|| Regex::new(r"(?i)Failures:\s*(\d+)").unwrap());
            let total: usize = total_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            let failed: usize = failures_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            (total.saturating_sub(failed), failed)
        }
        ProjectLanguage::CSharp => {
            static COUNTS: OnceLock<Regex> = OnceLock::new();
            let counts_re = COUNTS.get_or_init(|| {
                Regex::new(r"(?i)Failed:\s*(\d+).*?Passed:\s*(\d+)").unwrap()
            });
            if let Some(captures) = counts_re.captures(output) {
                let failed = captures[1].parse().unwrap_or(0);
                let passed = captures[2].parse().unwrap_or(0);
                return (passed, failed);
            }
            let (passed_re, failed_re) = pytest_re();
            let passed = passed_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            let failed = failed_re
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            (passed, failed)
        }
        ProjectLanguage::Unknown => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(detect_project_language(tmp.path()), ProjectLanguage::Unknown);

        std::fs::write(tmp.path().join("requirements.txt"), "pytest\n").unwrap();
        assert_eq!(detect_project_language(tmp.path()), ProjectLanguage::Python);

        // package.json takes precedence, as in the dispatch order.
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
        assert_eq!(
            detect_project_language(tmp.path()),
            ProjectLanguage::TypeScript
        );
    }

    #[test]
    fn parses_pytest_counts() {
        let output = "....F\n4 passed, 1 failed in 0.21s\n";
        assert_eq!(parse_test_output(ProjectLanguage::Python, output), (4, 1));

        let output = "5 passed in 0.10s\n";
        assert_eq!(parse_test_output(ProjectLanguage::Python, output), (5, 0));
    }

    #[test]
    fn parses_jest_counts() {
        let output = "Tests:       2 failed, 7 passed, 9 total\n";
        // Jest puts failed first; the passed capture still finds its count.
        let (passed, failed) = parse_test_output(ProjectLanguage::TypeScript, output);
        assert_eq!(failed, 2);
        assert_eq!(passed, 7);
    }

    #[test]
    fn parses_maven_counts() {
        let output = "Tests run: 12, Failures: 2, Errors: 0, Skipped: 1\n";
        assert_eq!(parse_test_output(ProjectLanguage::Java, output), (10, 2));
    }

    #[test]
    fn parses_dotnet_counts() {
        let output = "Passed!  - Failed:     0, Passed:    14, Skipped:     0\n";
        assert_eq!(parse_test_output(ProjectLanguage::CSharp, output), (14, 0));
    }

    #[tokio::test]
    async fn unknown_language_reports_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(tmp.path(), 5, 5);
        let results = runner.run_tests().await;
        assert!(!results.build_success);
        assert_eq!(results.error.as_deref(), Some("Unsupported language"));
    }

    #[tokio::test]
    async fn lint_skipped_for_unconfigured_language() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("pom.xml"), "<project/>").unwrap();
        let runner = TestRunner::new(tmp.path(), 5, 5);
        let (outcome, _) = runner.run_linter().await;
        assert_eq!(outcome, CheckOutcome::Skipped);
        let (outcome, _) = runner.run_typecheck().await;
        assert_eq!(outcome, CheckOutcome::Skipped);
    }
}
