//! Project-level metadata extraction: languages, frameworks, build tools,
//! versions, configurations, and code-style sampling

use crate::normalizer::Language;
use crate::scanner::scan_repo;
use regex::Regex;
use repograph_core::pkg::{CodeStyle, Project, ProjectMetadata};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;
use walkdir::WalkDir;

/// Framework → package name, for version lookup in package.json.
const FRAMEWORK_PACKAGES: &[(&str, &str)] = &[
    ("angular", "@angular/core"),
    ("react", "react"),
    ("vue", "vue"),
    ("nextjs", "next"),
    ("nestjs", "@nestjs/core"),
    ("express", "express"),
    ("fastapi", "fastapi"),
    ("flask", "flask"),
    ("django", "django"),
    ("spring-boot", "spring-boot"),
];

pub fn detect_languages(repo_root: &Path) -> Vec<String> {
    let mut languages: Vec<String> = scan_repo(repo_root)
        .iter()
        .map(|f| f.language.name().to_string())
        .collect();
    languages.sort();
    languages.dedup();
    languages
}

pub fn detect_build_tools(repo_root: &Path) -> Vec<String> {
    let mut tools = Vec::new();
    if repo_root.join("package.json").exists() {
        tools.push("npm".to_string());
        if repo_root.join("yarn.lock").exists() {
            tools.push("yarn".to_string());
        }
        if repo_root.join("pnpm-lock.yaml").exists() {
            tools.push("pnpm".to_string());
        }
    }
    if repo_root.join("pom.xml").exists() {
        tools.push("maven".to_string());
    }
    if repo_root.join("build.gradle").exists() || repo_root.join("build.gradle.kts").exists() {
        tools.push("gradle".to_string());
    }
    if find_by_extension(repo_root, "csproj").is_some() {
        tools.push("dotnet".to_string());
    }
    if repo_root.join("CMakeLists.txt").exists() {
        tools.push("cmake".to_string());
    }
    if repo_root.join("Makefile").exists() {
        tools.push("make".to_string());
    }
    tools
}

fn find_by_extension(repo_root: &Path, ext: &str) -> Option<std::path::PathBuf> {
    WalkDir::new(repo_root)
        .max_depth(4)
        .into_iter()
        .filter_entry(|e| e.file_name().to_string_lossy() != "node_modules")
        .filter_map(|e| e.ok())
        .find(|e| {
            e.file_type().is_file()
                && e.path().extension().and_then(|x| x.to_str()) == Some(ext)
        })
        .map(|e| e.into_path())
}

/// Current git SHA, or None when the tree is not a git repository.
pub fn get_git_sha(repo_root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        None
    } else {
        Some(sha)
    }
}

fn read_json(path: &Path) -> Option<serde_json::Value> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Project-level frameworks from manifest files. Per-module detection is
/// in `framework.rs`; this pass only needs the union of dependencies.
pub fn detect_frameworks(repo_root: &Path) -> Vec<String> {
    let mut frameworks = Vec::new();

    if let Some(pkg) = read_json(&repo_root.join("package.json")) {
        let mut deps = BTreeMap::new();
        for table in ["dependencies", "devDependencies"] {
            if let Some(map) = pkg[table].as_object() {
                for (name, version) in map {
                    deps.insert(name.clone(), version.as_str().unwrap_or("").to_string());
                }
            }
        }
        if deps.contains_key("@angular/core") {
            frameworks.push("angular".to_string());
        }
        if deps.contains_key("next") {
            frameworks.push("nextjs".to_string());
        }
        if deps.contains_key("react") && !deps.contains_key("next") {
            frameworks.push("react".to_string());
        }
        if deps.contains_key("vue") {
            frameworks.push("vue".to_string());
        }
        if deps.contains_key("@nestjs/core") {
            frameworks.push("nestjs".to_string());
        }
        if deps.contains_key("express") {
            frameworks.push("express".to_string());
        }
    }

    for manifest in ["requirements.txt", "setup.py"] {
        if let Ok(content) = std::fs::read_to_string(repo_root.join(manifest)) {
            let lower = content.to_lowercase();
            if lower.contains("flask") && !frameworks.iter().any(|f| f == "flask") {
                frameworks.push("flask".to_string());
            }
            if lower.contains("fastapi") && !frameworks.iter().any(|f| f == "fastapi") {
                frameworks.push("fastapi".to_string());
            }
            if lower.contains("django") && !frameworks.iter().any(|f| f == "django") {
                frameworks.push("django".to_string());
            }
        }
    }

    for manifest in ["pom.xml", "build.gradle", "build.gradle.kts"] {
        if let Ok(content) = std::fs::read_to_string(repo_root.join(manifest)) {
            if content.contains("spring-boot") {
                frameworks.push("spring-boot".to_string());
                break;
            }
        }
    }

    frameworks
}

fn framework_versions(
    repo_root: &Path,
    frameworks: &[String],
) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    let Some(pkg) = read_json(&repo_root.join("package.json")) else {
        return versions;
    };
    // package-lock.json carries exact versions; package.json only ranges.
    let lock = read_json(&repo_root.join("package-lock.json"));

    for framework in frameworks {
        let Some((_, package)) = FRAMEWORK_PACKAGES
            .iter()
            .find(|(name, _)| name == framework)
        else {
            continue;
        };
        let exact = lock.as_ref().and_then(|l| {
            l["packages"][format!("node_modules/{}", package)]["version"]
                .as_str()
                .map(String::from)
        });
        let ranged = pkg["dependencies"][package]
            .as_str()
            .or_else(|| pkg["devDependencies"][package].as_str())
            .map(String::from);
        if let Some(version) = exact.or(ranged) {
            versions.insert(framework.clone(), version);
        }
    }
    versions
}

fn node_version(repo_root: &Path) -> Option<String> {
    if let Ok(content) = std::fs::read_to_string(repo_root.join(".nvmrc")) {
        let v = content.trim().trim_start_matches('v').to_string();
        if !v.is_empty() {
            return Some(v);
        }
    }
    read_json(&repo_root.join("package.json"))
        .and_then(|pkg| pkg["engines"]["node"].as_str().map(String::from))
}

fn python_version(repo_root: &Path) -> Option<String> {
    for candidate in [".python-version", "runtime.txt"] {
        if let Ok(content) = std::fs::read_to_string(repo_root.join(candidate)) {
            let v = content.trim().trim_start_matches("python-").to_string();
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    let setup = std::fs::read_to_string(repo_root.join("setup.py")).ok()?;
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"python_requires\s*=\s*["']([^"']+)["']"#).unwrap());
    re.captures(&setup).map(|c| c[1].to_string())
}

fn java_version(repo_root: &Path) -> Option<String> {
    let pom = std::fs::read_to_string(repo_root.join("pom.xml")).ok()?;
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"<(?:java\.version|maven\.compiler\.source)>([^<]+)<").unwrap()
    });
    re.captures(&pom).map(|c| c[1].to_string())
}

fn ts_version(repo_root: &Path) -> Option<String> {
    let pkg = read_json(&repo_root.join("package.json"))?;
    pkg["devDependencies"]["typescript"]
        .as_str()
        .or_else(|| pkg["dependencies"]["typescript"].as_str())
        .map(String::from)
}

fn configurations(repo_root: &Path) -> BTreeMap<String, serde_json::Value> {
    let mut configs = BTreeMap::new();
    if let Some(angular) = read_json(&repo_root.join("angular.json")) {
        // Keep only the project names and default project; the full file is
        // large and the planner only needs the shape.
        let projects: Vec<String> = angular["projects"]
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        configs.insert(
            "angular".to_string(),
            serde_json::json!({ "projects": projects }),
        );
    }
    if let Some(tsconfig) = read_json(&repo_root.join("tsconfig.json")) {
        if let Some(options) = tsconfig.get("compilerOptions") {
            configs.insert(
                "typescript".to_string(),
                serde_json::json!({ "compilerOptions": options }),
            );
        }
    }
    if let Ok(requirements) = std::fs::read_to_string(repo_root.join("requirements.txt")) {
        let packages: Vec<String> = requirements
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect();
        if !packages.is_empty() {
            configs.insert("pythonPackages".to_string(), serde_json::json!(packages));
        }
    }
    configs
}

/// Sample source files under src/app/lib/components and derive the
/// dominant indentation, quote style, and naming convention.
pub fn extract_code_style(repo_root: &Path, sample_size: usize) -> CodeStyle {
    let mut samples = Vec::new();
    for dir in ["src", "app", "lib", "components"] {
        let root = repo_root.join(dir);
        if !root.exists() {
            continue;
        }
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if samples.len() >= sample_size {
                break;
            }
            if entry.file_type().is_file()
                && Language::from_path(entry.path()).is_some()
            {
                if let Ok(content) = std::fs::read_to_string(entry.path()) {
                    samples.push(content);
                }
            }
        }
        if samples.len() >= sample_size {
            break;
        }
    }

    if samples.is_empty() {
        return CodeStyle::default();
    }

    let mut single = 0usize;
    let mut double = 0usize;
    let mut indents: BTreeMap<String, usize> = BTreeMap::new();
    let mut snake = 0usize;
    let mut camel = 0usize;

    static SNAKE_RE: OnceLock<Regex> = OnceLock::new();
    static CAMEL_RE: OnceLock<Regex> = OnceLock::new();
    let snake_re = SNAKE_RE.get_or_init(|| Regex::new(r"\b[a-z]+_[a-z0-9_]+\b").unwrap());
    let camel_re = CAMEL_RE.get_or_init(|| Regex::new(r"\b[a-z]+[A-Z][a-zA-Z0-9]*\b").unwrap());

    for content in &samples {
        single += content.matches('\'').count();
        double += content.matches('"').count();
        snake += snake_re.find_iter(content).count();
        camel += camel_re.find_iter(content).count();
        for line in content.lines().take(50) {
            if line.starts_with('\t') {
                *indents.entry("tab".to_string()).or_default() += 1;
            } else {
                let spaces = line.len() - line.trim_start_matches(' ').len();
                if spaces > 0 {
                    *indents.entry(format!("{} spaces", spaces.min(8))).or_default() += 1;
                }
            }
        }
    }

    CodeStyle {
        indentation: indents
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(style, _)| style),
        quotes: Some(if single > double { "single" } else { "double" }.to_string()),
        naming_convention: Some(
            if snake > camel {
                "snake_case"
            } else {
                "camelCase"
            }
            .to_string(),
        ),
    }
}

/// Extract the full Project record for a repo root.
/// `id` and `name` are the basename of the root path.
pub fn extract_project_metadata(repo_root: &Path) -> (Project, Option<String>) {
    let name = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let languages = detect_languages(repo_root);
    let frameworks = detect_frameworks(repo_root);
    let build_tools = detect_build_tools(repo_root);
    let git_sha = get_git_sha(repo_root);

    debug!(
        "project metadata: {} languages={:?} frameworks={:?}",
        name, languages, frameworks
    );

    let metadata = ProjectMetadata {
        framework_versions: framework_versions(repo_root, &frameworks),
        node_version: node_version(repo_root),
        python_version: python_version(repo_root),
        java_version: java_version(repo_root),
        ts_version: ts_version(repo_root),
        configurations: configurations(repo_root),
        ui_patterns: Vec::new(),
        navigation_patterns: Vec::new(),
        code_style: extract_code_style(repo_root, 20),
    };

    let project = Project {
        id: name.clone(),
        name,
        root_path: repo_root.to_string_lossy().to_string(),
        languages,
        frameworks,
        build_tools,
        metadata,
    };
    (project, git_sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tools_from_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("yarn.lock"), "").unwrap();
        std::fs::write(tmp.path().join("Makefile"), "all:\n").unwrap();
        let tools = detect_build_tools(tmp.path());
        assert!(tools.contains(&"npm".to_string()));
        assert!(tools.contains(&"yarn".to_string()));
        assert!(tools.contains(&"make".to_string()));
        assert!(!tools.contains(&"maven".to_string()));
    }

    #[test]
    fn frameworks_from_package_json() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{"dependencies": {"@angular/core": "^17.0.0", "rxjs": "^7.0.0"}}"#,
        )
        .unwrap();
        let frameworks = detect_frameworks(tmp.path());
        assert_eq!(frameworks, vec!["angular"]);
    }

    #[test]
    fn flask_from_requirements() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("requirements.txt"), "Flask==3.0.0\npytest\n").unwrap();
        let frameworks = detect_frameworks(tmp.path());
        assert_eq!(frameworks, vec!["flask"]);
    }

    #[test]
    fn non_git_tree_has_no_sha() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(get_git_sha(tmp.path()), None);
    }

    #[test]
    fn project_id_is_root_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("demo-app");
        std::fs::create_dir_all(&root).unwrap();
        let (project, _) = extract_project_metadata(&root);
        assert_eq!(project.id, "demo-app");
        assert_eq!(project.name, "demo-app");
    }
}
