//! Plan, impact, test, and verification records shared across the workflow

use crate::intent::Intent;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Impact analysis
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskScore {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImpactResult {
    pub impacted_modules: Vec<ImpactedModule>,
    pub impacted_files: Vec<String>,
    pub affected_tests: Vec<String>,
    pub module_count: usize,
    pub file_count: usize,
    pub risk_score: RiskScore,
    pub requires_approval: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImpactedModule {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub kind: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub tasks: Vec<PlanTask>,
    pub total_estimated_time: String,
    pub migration_required: bool,
    pub intent: Intent,
    pub impact_summary: ImpactSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanTask {
    pub task_id: usize,
    pub task: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_estimate")]
    pub estimated_time: String,
}

fn default_estimate() -> String {
    "30min".to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub file_count: usize,
    pub module_count: usize,
    pub risk_score: Option<RiskScore>,
}

// ---------------------------------------------------------------------------
// Edit results
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EditResult {
    pub changes: Vec<FileChange>,
    pub errors: Vec<FileError>,
    pub validation_results: Vec<FileValidation>,
    pub total_files: usize,
    pub success: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileChange {
    pub file: String,
    pub status: String,
    pub diff: String,
    pub task_id: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub error: String,
    pub task_id: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileValidation {
    pub file: String,
    pub task_id: usize,
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Test results and verification
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestResults {
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub test_output: String,
    pub build_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of an optional check (lint, typecheck) that softens to
/// skipped when the tool is unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verification {
    pub ready_for_pr: bool,
    pub build_success: bool,
    pub tests_failed: usize,
    pub lint: CheckOutcome,
    pub typecheck: CheckOutcome,
    pub summary: String,
}
