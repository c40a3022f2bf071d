//! Impact analyzer — transitive impact set and deterministic risk score

use repograph_core::{ImpactResult, ImpactedModule, Intent, RiskScore};
use repograph_query::QueryEngine;
use tracing::info;

const IMPACT_DEPTH: usize = 2;

/// Risk thresholds. Deterministic for the same PKG and intent: the score
/// is a pure function of the impact set.
const HIGH_MODULE_COUNT: usize = 20;
const MEDIUM_MODULE_COUNT: usize = 5;

pub struct ImpactAnalyzer<'a> {
    engine: &'a QueryEngine,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self { engine }
    }

    pub async fn analyze_impact(&self, intent: &Intent, seed_ids: &[String]) -> ImpactResult {
        let impact = self.engine.impacted_modules(seed_ids, IMPACT_DEPTH).await;

        let impacted_modules: Vec<ImpactedModule> = impact
            .modules
            .iter()
            .map(|m| ImpactedModule {
                id: m.id.clone(),
                path: m.path.clone(),
                kind: m.kind.clone(),
                summary: m.module_summary.clone(),
            })
            .collect();

        let affected_tests: Vec<String> = impact
            .modules
            .iter()
            .filter(|m| {
                m.kind.iter().any(|k| k == "test")
                    || m.path.to_lowercase().contains("test")
                    || m.path.to_lowercase().contains("spec")
            })
            .map(|m| m.path.clone())
            .collect();

        let touches_data_layer = impact
            .modules
            .iter()
            .any(|m| m.kind.iter().any(|k| k == "entity" || k == "repository"));

        let module_count = impacted_modules.len();
        let risk_score = if module_count > HIGH_MODULE_COUNT || touches_data_layer {
            RiskScore::High
        } else if module_count > MEDIUM_MODULE_COUNT || !affected_tests.is_empty() {
            RiskScore::Medium
        } else {
            RiskScore::Low
        };

        let requires_approval = risk_score >= RiskScore::Medium;

        info!(
            "impact: intent={} modules={} tests={} risk={:?}",
            intent.intent,
            module_count,
            affected_tests.len(),
            risk_score
        );

        ImpactResult {
            file_count: impact.files.len(),
            impacted_files: impact.files,
            module_count,
            impacted_modules,
            affected_tests,
            risk_score,
            requires_approval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::pkg::*;
    use repograph_core::IntentCategory;
    use std::sync::Arc;

    fn module(id: &str, path: &str, kind: &[&str]) -> Module {
        Module {
            id: id.into(),
            path: path.into(),
            kind: kind.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from: from.into(),
            to: to.into(),
            edge_type: edge_type::IMPORTS.into(),
            weight: 1,
        }
    }

    fn pkg(modules: Vec<Module>, edges: Vec<Edge>) -> Arc<Pkg> {
        Arc::new(Pkg {
            version: PKG_VERSION.into(),
            generated_at: "2026-01-01T00:00:00Z".into(),
            git_sha: None,
            project: Project {
                id: "demo".into(),
                name: "demo".into(),
                root_path: "/tmp/demo".into(),
                ..Default::default()
            },
            modules,
            symbols: vec![],
            endpoints: vec![],
            edges,
            features: vec![],
        })
    }

    #[tokio::test]
    async fn three_module_chain_scores_at_least_medium() {
        // login.component.ts → auth.service.ts → http.service.ts, seeded
        // at the bottom: everything is reached and the spec test file
        // raises the score past low.
        let engine = QueryEngine::new(pkg(
            vec![
                module("mod:login.component.ts", "login.component.ts", &["component"]),
                module("mod:auth.service.ts", "auth.service.ts", &["service"]),
                module("mod:http.service.ts", "http.service.ts", &["service"]),
                module("mod:auth.service.spec.ts", "auth.service.spec.ts", &["test"]),
            ],
            vec![
                edge("mod:login.component.ts", "mod:auth.service.ts"),
                edge("mod:auth.service.ts", "mod:http.service.ts"),
                edge("mod:auth.service.spec.ts", "mod:auth.service.ts"),
            ],
        ));
        let analyzer = ImpactAnalyzer::new(&engine);
        let intent = Intent::minimal(IntentCategory::CodeChange, "change http handling");
        let result = analyzer
            .analyze_impact(&intent, &["mod:http.service.ts".to_string()])
            .await;

        assert!(result.module_count >= 3);
        assert!(result
            .impacted_files
            .contains(&"login.component.ts".to_string()));
        assert!(result.risk_score >= RiskScore::Medium);
        assert!(result.requires_approval);
    }

    #[tokio::test]
    async fn entity_tag_forces_high_risk() {
        let engine = QueryEngine::new(pkg(
            vec![
                module("mod:user.entity.ts", "user.entity.ts", &["entity"]),
                module("mod:user.service.ts", "user.service.ts", &["service"]),
            ],
            vec![edge("mod:user.service.ts", "mod:user.entity.ts")],
        ));
        let analyzer = ImpactAnalyzer::new(&engine);
        let intent = Intent::minimal(IntentCategory::CodeChange, "touch users");
        let result = analyzer
            .analyze_impact(&intent, &["mod:user.service.ts".to_string()])
            .await;
        assert_eq!(result.risk_score, RiskScore::High);
    }

    #[tokio::test]
    async fn isolated_module_is_low_risk() {
        let engine = QueryEngine::new(pkg(
            vec![module("mod:util.ts", "util.ts", &["util"])],
            vec![],
        ));
        let analyzer = ImpactAnalyzer::new(&engine);
        let intent = Intent::minimal(IntentCategory::CodeChange, "tweak a helper");
        let result = analyzer
            .analyze_impact(&intent, &["mod:util.ts".to_string()])
            .await;
        assert_eq!(result.risk_score, RiskScore::Low);
        assert!(!result.requires_approval);
        assert_eq!(result.module_count, 1);
    }

    #[tokio::test]
    async fn deterministic_for_same_inputs() {
        let engine = QueryEngine::new(pkg(
            vec![
                module("mod:a.ts", "a.ts", &[]),
                module("mod:b.ts", "b.ts", &[]),
            ],
            vec![edge("mod:a.ts", "mod:b.ts")],
        ));
        let analyzer = ImpactAnalyzer::new(&engine);
        let intent = Intent::minimal(IntentCategory::CodeChange, "x");
        let first = analyzer
            .analyze_impact(&intent, &["mod:a.ts".to_string()])
            .await;
        let second = analyzer
            .analyze_impact(&intent, &["mod:a.ts".to_string()])
            .await;
        assert_eq!(first.risk_score, second.risk_score);
        assert_eq!(first.module_count, second.module_count);
        assert_eq!(first.impacted_files, second.impacted_files);
    }
}
