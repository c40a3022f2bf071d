//! Integration tests for PKG generation: stable IDs, invariants, cache
//! soundness against a real git tree

use repograph_pkg::{generate_pkg, load_cached_pkg, PkgBuilder};
use std::path::Path;
use std::process::Command;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fixture_repo() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "src/login.component.ts",
        "import { AuthService } from './auth.service';\n\nexport class LoginComponent {\n    constructor(private auth: AuthService) {}\n}\n",
    );
    write(
        tmp.path(),
        "src/auth.service.ts",
        "import { HttpService } from './http.service';\n\nexport class AuthService {\n    login(user: string) { return null; }\n}\n",
    );
    write(
        tmp.path(),
        "src/http.service.ts",
        "export class HttpService {\n    get(url: string) { return null; }\n}\n",
    );
    write(tmp.path(), "README.md", "# demo\n");
    tmp
}

fn git(root: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(root)
        .env("GIT_AUTHOR_NAME", "t")
        .env("GIT_AUTHOR_EMAIL", "t@t")
        .env("GIT_COMMITTER_NAME", "t")
        .env("GIT_COMMITTER_EMAIL", "t@t")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn init_git(root: &Path) -> bool {
    git(root, &["init", "-q"]) && git(root, &["add", "-A"]) && git(root, &["commit", "-q", "-m", "init"])
}

// ===========================================================================
// Stable IDs and invariants
// ===========================================================================

#[test]
fn module_ids_are_stable_across_runs() {
    let repo = fixture_repo();
    let first = PkgBuilder::new(repo.path(), 3).build().unwrap();
    let second = PkgBuilder::new(repo.path(), 3).build().unwrap();

    let ids_first: Vec<&String> = first.modules.iter().map(|m| &m.id).collect();
    let ids_second: Vec<&String> = second.modules.iter().map(|m| &m.id).collect();
    assert_eq!(ids_first, ids_second);
    assert!(ids_first.contains(&&"mod:src/login.component.ts".to_string()));
}

#[test]
fn pkg_invariants_hold_after_generation() {
    let repo = fixture_repo();
    let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
    assert!(pkg.validate().is_ok(), "{:?}", pkg.validate().unwrap_err());

    // Import chain resolved: login → auth → http.
    assert!(pkg.edges.iter().any(|e| {
        e.from == "mod:src/login.component.ts"
            && e.to == "mod:src/auth.service.ts"
            && e.edge_type == "imports"
    }));
    assert!(pkg.edges.iter().any(|e| {
        e.from == "mod:src/auth.service.ts"
            && e.to == "mod:src/http.service.ts"
            && e.edge_type == "imports"
    }));

    // Non-source files never become modules.
    assert!(!pkg.modules.iter().any(|m| m.path.ends_with(".md")));
}

// ===========================================================================
// Cache soundness
// ===========================================================================

#[test]
fn cache_hit_returns_equal_document_without_reparsing() {
    let repo = fixture_repo();
    if !init_git(repo.path()) {
        eprintln!("SKIP: git unavailable");
        return;
    }

    let first = generate_pkg(repo.path(), 3, true).unwrap();
    assert!(first.git_sha.is_some());
    assert!(repo.path().join("pkg.json").exists());

    // Second run with no file changes: same SHA, read from pkg.json.
    // generatedAt would differ if the parsers re-ran, so equality of the
    // serialized document proves the cache was used.
    let second = generate_pkg(repo.path(), 3, true).unwrap();
    assert_eq!(second.git_sha, first.git_sha);
    assert_eq!(
        serde_json::to_value(&second).unwrap(),
        serde_json::to_value(&first).unwrap()
    );
}

#[test]
fn cache_invalidated_when_sha_changes() {
    let repo = fixture_repo();
    if !init_git(repo.path()) {
        eprintln!("SKIP: git unavailable");
        return;
    }

    let first = generate_pkg(repo.path(), 3, true).unwrap();

    // New commit changes the SHA; the cached document must be regenerated.
    write(repo.path(), "src/extra.ts", "export const x = 1;\n");
    assert!(git(repo.path(), &["add", "-A"]));
    assert!(git(repo.path(), &["commit", "-q", "-m", "more"]));

    assert!(load_cached_pkg(repo.path()).is_none());
    let second = generate_pkg(repo.path(), 3, true).unwrap();
    assert_ne!(second.git_sha, first.git_sha);
    assert!(second.modules.iter().any(|m| m.id == "mod:src/extra.ts"));
}

#[test]
fn non_git_tree_always_regenerates() {
    let repo = fixture_repo();
    let first = generate_pkg(repo.path(), 3, true).unwrap();
    assert!(first.git_sha.is_none());
    // The cache file exists but cannot validate without a SHA.
    assert!(repo.path().join("pkg.json").exists());
    assert!(load_cached_pkg(repo.path()).is_none());
}

// ===========================================================================
// Scanner boundaries
// ===========================================================================

#[test]
fn cloned_repos_and_vcs_dirs_skipped() {
    let repo = fixture_repo();
    write(
        repo.path(),
        "cloned_repos/other/src/app.ts",
        "export const hidden = 1;\n",
    );
    write(
        repo.path(),
        "node_modules/pkg/index.js",
        "module.exports = {};\n",
    );
    let pkg = PkgBuilder::new(repo.path(), 3).build().unwrap();
    assert!(!pkg.modules.iter().any(|m| m.path.contains("cloned_repos")));
    assert!(!pkg.modules.iter().any(|m| m.path.contains("node_modules")));
}
