//! Source scanner — walks a repository and classifies files by language

use crate::normalizer::Language;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directories that never contain project sources.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "__pycache__",
    ".venv",
    "venv",
    "vendor",
    ".idea",
    ".vscode",
    "cloned_repos",
];

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub abs_path: PathBuf,
    /// Repo-relative, forward slashes on every OS.
    pub rel_path: String,
    pub language: Language,
}

/// Walk the tree and return every file of a recognized language.
/// Files of unknown language are dropped from the module set.
pub fn scan_repo(repo_root: &Path) -> Vec<SourceFile> {
    let mut files = Vec::new();

    for entry in WalkDir::new(repo_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()))
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(language) = Language::from_path(entry.path()) else {
            continue;
        };
        let rel_path = entry
            .path()
            .strip_prefix(repo_root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        files.push(SourceFile {
            abs_path: entry.path().to_path_buf(),
            rel_path,
            language,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!("scanned {}: {} source files", repo_root.display(), files.len());
    files
}

/// Stable module ID from a repo-relative path.
pub fn module_id(rel_path: &str) -> String {
    format!("mod:{}", rel_path.replace('\\', "/"))
}

/// Stable symbol ID within a module.
pub fn symbol_id(module_id: &str, qualified_name: &str) -> String {
    format!("sym:{}:{}", module_id, qualified_name)
}

/// Stable feature ID from a repo-relative folder path.
pub fn feature_id(folder_path: &str) -> String {
    format!("feat:{}", folder_path.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_path_based_and_separator_invariant() {
        assert_eq!(module_id("src/app.ts"), "mod:src/app.ts");
        assert_eq!(module_id("src\\app.ts"), "mod:src/app.ts");
        assert_eq!(
            symbol_id("mod:src/app.ts", "AppComponent.ngOnInit"),
            "sym:mod:src/app.ts:AppComponent.ngOnInit"
        );
        assert_eq!(feature_id("src/auth"), "feat:src/auth");
    }
}
