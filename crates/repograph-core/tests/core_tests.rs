//! Tests for repograph-core: PKG invariants, protocol shapes, config defaults

use repograph_core::*;

fn module(id: &str, path: &str) -> Module {
    Module {
        id: id.into(),
        path: path.into(),
        ..Default::default()
    }
}

fn symbol(id: &str, module_id: &str, name: &str) -> Symbol {
    Symbol {
        id: id.into(),
        module_id: module_id.into(),
        name: name.into(),
        kind: SymbolKind::Function,
        is_exported: true,
        signature: format!("{}()", name),
        visibility: "public".into(),
        summary: None,
    }
}

fn small_pkg() -> Pkg {
    Pkg {
        version: PKG_VERSION.into(),
        generated_at: "2026-01-01T00:00:00Z".into(),
        git_sha: Some("abc123".into()),
        project: Project {
            id: "demo".into(),
            name: "demo".into(),
            root_path: "/tmp/demo".into(),
            ..Default::default()
        },
        modules: vec![module("mod:a.py", "a.py"), module("mod:b.py", "b.py")],
        symbols: vec![symbol("sym:mod:a.py:run", "mod:a.py", "run")],
        endpoints: vec![],
        edges: vec![Edge {
            from: "mod:a.py".into(),
            to: "mod:b.py".into(),
            edge_type: edge_type::IMPORTS.into(),
            weight: 1,
        }],
        features: vec![],
    }
}

// ===========================================================================
// PKG invariants
// ===========================================================================

#[test]
fn valid_pkg_passes_validation() {
    assert!(small_pkg().validate().is_ok());
}

#[test]
fn symbol_with_missing_module_fails() {
    let mut pkg = small_pkg();
    pkg.symbols.push(Symbol {
        module_id: "mod:missing.py".into(),
        ..symbol("sym:mod:missing.py:f", "mod:missing.py", "f")
    });
    let problems = pkg.validate().unwrap_err();
    assert!(problems.iter().any(|p| p.contains("missing module")));
}

#[test]
fn edge_to_unknown_endpoint_fails() {
    let mut pkg = small_pkg();
    pkg.edges.push(Edge {
        from: "mod:a.py".into(),
        to: "mod:nowhere.py".into(),
        edge_type: edge_type::CALLS.into(),
        weight: 1,
    });
    assert!(pkg.validate().is_err());
}

#[test]
fn edge_to_symbol_of_existing_module_passes() {
    let mut pkg = small_pkg();
    // Symbol endpoint not in the symbols table, but its module exists.
    pkg.edges.push(Edge {
        from: "mod:b.py".into(),
        to: "sym:mod:a.py:run".into(),
        edge_type: edge_type::CALLS.into(),
        weight: 1,
    });
    assert!(pkg.validate().is_ok());
}

#[test]
fn export_of_foreign_symbol_fails() {
    let mut pkg = small_pkg();
    pkg.modules[1].exports.push("sym:mod:a.py:run".into());
    let problems = pkg.validate().unwrap_err();
    assert!(problems.iter().any(|p| p.contains("exports unknown symbol")));
}

#[test]
fn feature_with_unknown_module_fails() {
    let mut pkg = small_pkg();
    pkg.features.push(Feature {
        id: "feat:src".into(),
        name: "src".into(),
        path: "src".into(),
        module_ids: vec!["mod:ghost.py".into()],
    });
    assert!(pkg.validate().is_err());
}

// ===========================================================================
// Serialization format
// ===========================================================================

#[test]
fn pkg_serializes_camel_case() {
    let value = serde_json::to_value(small_pkg()).unwrap();
    assert_eq!(value["version"], "1.0.0");
    assert!(value["generatedAt"].is_string());
    assert_eq!(value["gitSha"], "abc123");
    assert!(value["project"]["rootPath"].is_string());
    assert_eq!(value["edges"][0]["type"], "imports");
}

#[test]
fn pkg_roundtrip() {
    let pkg = small_pkg();
    let json = serde_json::to_string(&pkg).unwrap();
    let back: Pkg = serde_json::from_str(&json).unwrap();
    assert_eq!(back.modules.len(), pkg.modules.len());
    assert_eq!(back.edges[0].edge_type, "imports");
    assert!(back.validate().is_ok());
}

#[test]
fn intent_category_wire_names() {
    let value = serde_json::to_value(IntentCategory::InformationalQuery).unwrap();
    assert_eq!(value, "informational_query");
    let parsed: IntentCategory = serde_json::from_str("\"diagram_request\"").unwrap();
    assert_eq!(parsed, IntentCategory::DiagramRequest);
}

#[test]
fn risk_score_ordering() {
    assert!(RiskScore::Low < RiskScore::Medium);
    assert!(RiskScore::Medium < RiskScore::High);
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn config_defaults() {
    let config = AgentConfig::default();
    assert!(config.approval_required);
    assert_eq!(config.test_timeout_secs, 300);
    assert_eq!(config.lint_timeout_secs, 60);
    assert_eq!(config.pkg_fan_threshold, 3);
    assert_eq!(config.clone_root, std::path::PathBuf::from("./cloned_repos"));
    assert_eq!(config.graph_db.database, "repos");
    assert_eq!(config.graph_db.batch_size, 1000);
    assert_eq!(config.git_user_name, "Agent");
}
