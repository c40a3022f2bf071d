//! Planner — turns intent + impact + PKG context into an ordered task list
//!
//! The oracle drafts the plan; framework-aware validation then enforces
//! file-extension conventions (Angular never gets `.tsx`), and a
//! deterministic fallback slices impacted files into trivial tasks so the
//! pipeline always has a plan.

use repograph_core::pkg::Pkg;
use repograph_core::{ImpactResult, ImpactSummary, Intent, Plan, PlanTask};
use repograph_llm::provider::extract_json_object;
use repograph_llm::{LlmRequest, SharedOracle};
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

pub struct Planner {
    oracle: SharedOracle,
}

/// Structural framework fingerprints scanned from the repo root, used when
/// the PKG reports no framework. `cloned_repos/**` never participates.
#[derive(Debug, Default)]
struct StructureAnalysis {
    framework: Option<String>,
    examples: Vec<String>,
}

impl Planner {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    pub async fn generate_plan(
        &self,
        intent: &Intent,
        impact: &ImpactResult,
        constraints: &[String],
        pkg: Option<&Pkg>,
    ) -> Plan {
        let repo_root = pkg.map(|p| p.project.root_path.clone());
        let structure = repo_root
            .as_deref()
            .map(|root| analyze_project_structure(Path::new(root)))
            .unwrap_or_default();

        let mut framework = pkg
            .and_then(|p| p.project.frameworks.first().cloned())
            .unwrap_or_else(|| "unknown".to_string());
        if framework == "unknown" {
            if let Some(detected) = &structure.framework {
                info!("framework from structure analysis: {}", detected);
                framework = detected.clone();
            }
        }

        let plan = match &self.oracle {
            Some(oracle) => {
                let prompt = self.build_prompt(intent, impact, constraints, pkg, &structure, &framework);
                match oracle.complete(LlmRequest::new(prompt).with_temperature(0.3)).await {
                    Ok(response) => match extract_json_object(&response) {
                        Some(value) => normalize_plan(value, intent, impact),
                        None => {
                            warn!("plan response carried no JSON, using fallback plan");
                            fallback_plan(intent, impact)
                        }
                    },
                    Err(e) => {
                        warn!("plan oracle unavailable ({}), using fallback plan", e);
                        fallback_plan(intent, impact)
                    }
                }
            }
            None => fallback_plan(intent, impact),
        };

        enforce_framework_extensions(plan, &framework)
    }

    fn build_prompt(
        &self,
        intent: &Intent,
        impact: &ImpactResult,
        constraints: &[String],
        pkg: Option<&Pkg>,
        structure: &StructureAnalysis,
        framework: &str,
    ) -> String {
        let mut module_lines = String::new();
        for (i, module) in impact.impacted_modules.iter().take(10).enumerate() {
            module_lines.push_str(&format!(
                "{}. {} ({})\n",
                i + 1,
                module.path,
                module.kind.join(", ")
            ));
            if let Some(summary) = &module.summary {
                module_lines.push_str(&format!("   Summary: {}\n", truncate(summary, 100)));
            }
        }
        if module_lines.is_empty() {
            module_lines.push_str("No modules found\n");
        }

        let constraint_lines = if constraints.is_empty() {
            "- None specified".to_string()
        } else {
            constraints
                .iter()
                .map(|c| format!("- {}", c))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut context = String::new();
        if let Some(pkg) = pkg {
            if !pkg.project.languages.is_empty() {
                context.push_str(&format!(
                    "- Languages: {}\n",
                    pkg.project.languages.join(", ")
                ));
            }
            if let Some(naming) = &pkg.project.metadata.code_style.naming_convention {
                context.push_str(&format!("- Naming convention: {}\n", naming));
            }
        }
        if !context.is_empty() {
            context = format!(
                "\nProject Context (from knowledge graph):\n{}\nIMPORTANT: Follow the project's framework patterns, import styles, and naming conventions shown above when planning changes.\n",
                context
            );
        }
        if !structure.examples.is_empty() {
            context.push_str("\nExisting Project Files (follow these patterns):\n");
            for example in structure.examples.iter().take(5) {
                context.push_str(&format!("- {}\n", example));
            }
        }

        format!(
            "{framework_instruction}You are a code-change planner. Given the following information, produce a detailed, step-by-step plan for implementing the requested changes.\n\n\
             Intent: {description}\n\
             Intent Type: {intent}\n\
             Risk Level: {risk:?}\n\n\
             Impacted Modules ({module_count} total):\n{modules}\n\
             Impacted Files: {file_count} files\n\
             Affected Tests: {test_count} test files\n\n\
             Constraints:\n{constraints}\n{context}\n\
             Produce a numbered plan of code edits with:\n\
             1. Files to modify (relative path from repo root)\n\
             2. Specific changes (add field, update method signature, call new function, etc.)\n\
             3. Tests to add/change (file path + test name/description)\n\
             4. Migration steps if database changes are required\n\
             5. CI changes if needed\n\n\
             Return a JSON object with this structure:\n{example}\n\n\
             IMPORTANT: Follow the framework-specific file naming and extensions shown in the example above.\n\n\
             Be specific, actionable, and consider the constraints. Order tasks logically (dependencies first).",
            framework_instruction = framework_instruction(framework),
            description = intent.description,
            intent = intent.intent,
            risk = impact.risk_score,
            module_count = impact.module_count,
            modules = module_lines,
            file_count = impact.file_count,
            test_count = impact.affected_tests.len(),
            constraints = constraint_lines,
            context = context,
            example = example_json(framework),
        )
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn framework_instruction(framework: &str) -> String {
    match framework.to_lowercase().as_str() {
        "angular" => "CRITICAL FRAMEWORK REQUIREMENT: This is an ANGULAR project. You MUST:\n\
             - Use .ts file extensions for components (NOT .tsx)\n\
             - Use Angular component syntax: @Component decorator\n\
             - Use Angular imports: @angular/core, @angular/common\n\
             - Use Angular naming: login.component.ts (NOT Login.tsx)\n\
             - Separate files for template (.html) and styles (.css)\n\n"
            .to_string(),
        "react" => "CRITICAL FRAMEWORK REQUIREMENT: This is a REACT project. You MUST:\n\
             - Use .tsx file extensions for components (NOT .ts)\n\
             - Use React imports: import React from 'react'\n\
             - Use PascalCase for component file names: Login.tsx\n\n"
            .to_string(),
        "vue" => "CRITICAL FRAMEWORK REQUIREMENT: This is a VUE project. You MUST:\n\
             - Use .vue file extensions for components\n\
             - Use Vue component syntax: <template>, <script>, <style>\n\n"
            .to_string(),
        "nestjs" => "CRITICAL FRAMEWORK REQUIREMENT: This is a NESTJS project. You MUST:\n\
             - Use .ts file extensions (NOT .tsx)\n\
             - Use NestJS decorators: @Controller, @Injectable, @Module\n\
             - Follow NestJS file structure: *.controller.ts, *.service.ts, *.module.ts\n\n"
            .to_string(),
        "flask" => "CRITICAL FRAMEWORK REQUIREMENT: This is a FLASK project. You MUST:\n\
             - Use .py file extensions\n\
             - Use Flask route decorators and Blueprints for route organization\n\
             - Follow Flask file structure: routes/, services/, models/\n\n"
            .to_string(),
        "unknown" => String::new(),
        other => format!(
            "CRITICAL FRAMEWORK REQUIREMENT: This is a {} project. \
             You MUST use {} syntax, patterns, and conventions.\n\n",
            other.to_uppercase(),
            other
        ),
    }
}

fn example_json(framework: &str) -> String {
    let files = match framework.to_lowercase().as_str() {
        "angular" => {
            r#"["src/components/login/login.component.ts", "src/components/login/login.component.html"]"#
        }
        "react" => r#"["src/components/Login.tsx", "src/components/UserProfile.tsx"]"#,
        "vue" => r#"["src/components/Login.vue", "src/components/UserProfile.vue"]"#,
        "nestjs" => r#"["src/auth/auth.controller.ts", "src/auth/auth.service.ts"]"#,
        "flask" => r#"["routes/auth.py", "services/auth_service.py", "app.py"]"#,
        _ => r#"["path/to/file1.py", "path/to/file2.ts"]"#,
    };
    format!(
        r#"{{
  "tasks": [
    {{
      "task": "Description of task",
      "files": {},
      "changes": ["Add field X to class Y", "Update method Z to handle new case"],
      "tests": ["tests/test_file1.py - test_new_functionality"],
      "notes": "Migration required: add column to database",
      "estimated_time": "30min"
    }}
  ],
  "total_estimated_time": "2h",
  "migration_required": false
}}"#,
        files
    )
}

/// Scan the repo root for framework fingerprints, excluding cloned_repos.
fn analyze_project_structure(repo_root: &Path) -> StructureAnalysis {
    let mut analysis = StructureAnalysis::default();
    if !repo_root.exists() {
        return analysis;
    }

    let mut flask_score = 0usize;
    let mut angular_score = 0usize;
    let mut react_score = 0usize;

    if let Ok(requirements) = std::fs::read_to_string(repo_root.join("requirements.txt")) {
        if requirements.to_lowercase().contains("flask") {
            flask_score += 100;
            analysis.examples.push("requirements.txt".to_string());
        }
    }
    if repo_root.join("app.py").exists() {
        flask_score += 100;
        analysis.examples.push("app.py".to_string());
    }

    for entry in WalkDir::new(repo_root)
        .max_depth(6)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            name != "cloned_repos" && name != "node_modules" && name != ".git"
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let rel = entry
            .path()
            .strip_prefix(repo_root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        if name.ends_with(".component.ts") || name.ends_with(".module.ts") {
            angular_score += 1;
            if analysis.examples.len() < 8 {
                analysis.examples.push(rel);
            }
        } else if name.ends_with(".tsx") || name.ends_with(".jsx") {
            react_score += 1;
            if analysis.examples.len() < 8 {
                analysis.examples.push(rel);
            }
        }
    }
    if repo_root.join("src/app").exists() {
        angular_score += 1;
    }
    if repo_root.join("src/components").exists() {
        react_score += 1;
    }

    // Flask wins outright when detected; otherwise highest score.
    analysis.framework = if flask_score > 0 {
        Some("flask".to_string())
    } else if angular_score > 0 && angular_score >= react_score {
        Some("angular".to_string())
    } else if react_score > 0 {
        Some("react".to_string())
    } else {
        None
    };
    analysis
}

/// Shape the oracle's JSON into the Plan record, renumbering tasks and
/// deriving the migration flag from task notes.
fn normalize_plan(value: serde_json::Value, intent: &Intent, impact: &ImpactResult) -> Plan {
    let mut tasks: Vec<PlanTask> = Vec::new();
    if let Some(raw_tasks) = value["tasks"].as_array() {
        for (i, raw) in raw_tasks.iter().enumerate() {
            let string_list = |key: &str| -> Vec<String> {
                raw[key]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default()
            };
            tasks.push(PlanTask {
                task_id: i + 1,
                task: raw["task"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| format!("Task {}", i + 1)),
                files: string_list("files"),
                changes: string_list("changes"),
                tests: string_list("tests"),
                notes: raw["notes"].as_str().unwrap_or_default().to_string(),
                estimated_time: raw["estimated_time"]
                    .as_str()
                    .unwrap_or("30min")
                    .to_string(),
            });
        }
    }

    let mut migration_required = value["migration_required"].as_bool().unwrap_or(false);
    if !migration_required {
        migration_required = tasks.iter().any(|task| {
            let notes = task.notes.to_lowercase();
            notes.contains("migration") || notes.contains("database") || notes.contains("schema")
        });
    }

    Plan {
        plan_id: uuid::Uuid::new_v4().to_string(),
        total_estimated_time: value["total_estimated_time"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| format!("{}min", tasks.len() * 30)),
        tasks,
        migration_required,
        intent: intent.clone(),
        impact_summary: ImpactSummary {
            file_count: impact.file_count,
            module_count: impact.module_count,
            risk_score: Some(impact.risk_score),
        },
    }
}

/// Deterministic fallback: slice up to five impacted files into trivial
/// single-file tasks so the rest of the pipeline still has a plan.
fn fallback_plan(intent: &Intent, impact: &ImpactResult) -> Plan {
    let tasks: Vec<PlanTask> = impact
        .impacted_files
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, file)| PlanTask {
            task_id: i + 1,
            task: format!(
                "Modify {}",
                file.rsplit('/').next().unwrap_or(file.as_str())
            ),
            files: vec![file.clone()],
            changes: vec![format!("Apply changes as per intent: {}", intent.description)],
            tests: Vec::new(),
            notes: String::new(),
            estimated_time: "30min".to_string(),
        })
        .collect();

    Plan {
        plan_id: uuid::Uuid::new_v4().to_string(),
        total_estimated_time: format!("{}min", tasks.len() * 30),
        tasks,
        migration_required: false,
        intent: intent.clone(),
        impact_summary: ImpactSummary {
            file_count: impact.file_count,
            module_count: impact.module_count,
            risk_score: Some(impact.risk_score),
        },
    }
}

/// Framework-extension invariant: Angular tasks never carry `.tsx` files.
fn enforce_framework_extensions(mut plan: Plan, framework: &str) -> Plan {
    if framework.to_lowercase() == "angular" {
        for task in &mut plan.tasks {
            for file in &mut task.files {
                if file.ends_with(".tsx") {
                    let corrected = format!("{}.ts", file.trim_end_matches(".tsx"));
                    warn!(
                        "corrected file extension for Angular: {} -> {}",
                        file, corrected
                    );
                    *file = corrected;
                }
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::{IntentCategory, RiskScore};
    use repograph_llm::MockOracle;
    use std::sync::Arc;

    fn impact(files: &[&str]) -> ImpactResult {
        ImpactResult {
            impacted_modules: Vec::new(),
            impacted_files: files.iter().map(|s| s.to_string()).collect(),
            affected_tests: Vec::new(),
            module_count: files.len(),
            file_count: files.len(),
            risk_score: RiskScore::Medium,
            requires_approval: true,
        }
    }

    fn pkg_with_framework(framework: &str) -> Pkg {
        Pkg {
            version: "1.0.0".into(),
            generated_at: "2026-01-01T00:00:00Z".into(),
            git_sha: None,
            project: repograph_core::pkg::Project {
                id: "demo".into(),
                name: "demo".into(),
                root_path: "/nonexistent".into(),
                frameworks: vec![framework.to_string()],
                ..Default::default()
            },
            modules: vec![],
            symbols: vec![],
            endpoints: vec![],
            edges: vec![],
            features: vec![],
        }
    }

    #[tokio::test]
    async fn angular_plan_rewrites_tsx_files() {
        let oracle = MockOracle::new(vec![
            r#"{"tasks": [{"task": "Add login", "files": ["src/components/login/Login.tsx"], "changes": ["add form"], "tests": [], "notes": "", "estimated_time": "30min"}], "total_estimated_time": "30min", "migration_required": false}"#,
        ]);
        let planner = Planner::new(Some(Arc::new(oracle)));
        let intent = Intent::minimal(IntentCategory::CodeChange, "add login");
        let pkg = pkg_with_framework("angular");
        let plan = planner
            .generate_plan(&intent, &impact(&["src/a.ts"]), &[], Some(&pkg))
            .await;

        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].files, vec!["src/components/login/Login.ts"]);
        assert!(plan
            .tasks
            .iter()
            .all(|t| t.files.iter().all(|f| !f.ends_with(".tsx"))));
    }

    #[tokio::test]
    async fn react_plan_keeps_tsx() {
        let oracle = MockOracle::new(vec![
            r#"{"tasks": [{"task": "Add login", "files": ["src/components/Login.tsx"], "changes": [], "tests": [], "notes": "", "estimated_time": "1h"}], "total_estimated_time": "1h", "migration_required": false}"#,
        ]);
        let planner = Planner::new(Some(Arc::new(oracle)));
        let intent = Intent::minimal(IntentCategory::CodeChange, "add login");
        let pkg = pkg_with_framework("react");
        let plan = planner
            .generate_plan(&intent, &impact(&["src/a.tsx"]), &[], Some(&pkg))
            .await;
        assert_eq!(plan.tasks[0].files, vec!["src/components/Login.tsx"]);
    }

    #[tokio::test]
    async fn fallback_plan_slices_impacted_files() {
        let planner = Planner::new(None);
        let intent = Intent::minimal(IntentCategory::CodeChange, "refactor everything");
        let files = ["a.py", "b.py", "c.py", "d.py", "e.py", "f.py", "g.py"];
        let plan = planner
            .generate_plan(&intent, &impact(&files), &[], None)
            .await;

        assert_eq!(plan.tasks.len(), 5);
        assert_eq!(plan.tasks[0].files, vec!["a.py"]);
        assert_eq!(plan.tasks[0].task_id, 1);
        assert_eq!(plan.tasks[4].task_id, 5);
        assert!(!plan.migration_required);
        assert_eq!(plan.impact_summary.risk_score, Some(RiskScore::Medium));
    }

    #[tokio::test]
    async fn migration_flag_from_task_notes() {
        let oracle = MockOracle::new(vec![
            r#"{"tasks": [{"task": "Alter users", "files": ["models/user.py"], "changes": [], "tests": [], "notes": "requires a database schema migration", "estimated_time": "1h"}], "total_estimated_time": "1h", "migration_required": false}"#,
        ]);
        let planner = Planner::new(Some(Arc::new(oracle)));
        let intent = Intent::minimal(IntentCategory::CodeChange, "add column");
        let plan = planner
            .generate_plan(&intent, &impact(&["models/user.py"]), &[], None)
            .await;
        assert!(plan.migration_required);
    }

    #[tokio::test]
    async fn structure_analysis_detects_flask() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("requirements.txt"), "flask\n").unwrap();
        std::fs::write(tmp.path().join("app.py"), "from flask import Flask\n").unwrap();
        // Files under cloned_repos never count.
        let nested = tmp.path().join("cloned_repos/other/src");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("x.component.ts"), "").unwrap();

        let analysis = analyze_project_structure(tmp.path());
        assert_eq!(analysis.framework.as_deref(), Some("flask"));
        assert!(analysis.examples.iter().all(|e| !e.contains("cloned_repos")));
    }
}
