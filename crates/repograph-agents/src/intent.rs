//! Intent router — classifies a user utterance
//!
//! The router never errors: when the oracle is unreachable or returns
//! garbage, a small keyword rule-set produces a minimal intent that
//! downstream components must tolerate.

use repograph_core::{Intent, IntentCategory};
use repograph_llm::provider::extract_json_object;
use repograph_llm::{LlmRequest, SharedOracle};
use tracing::{debug, warn};

const CLASSIFY_PROMPT: &str = r#"You classify requests about a source repository.

Return a JSON object with exactly these fields:
{
  "intent_category": "informational_query" | "diagram_request" | "code_change",
  "intent": "<short snake_case label>",
  "description": "<one-sentence restatement of the request>",
  "constraints": ["<explicit constraints, if any>"],
  "target_modules": ["<tags or module name hints, e.g. auth, login>"],
  "human_approval": <true if the user asked to confirm before changes>,
  "diagram_type": "<architecture|dependency|focused, only for diagram requests>",
  "target_files": ["<file hints, only for code changes>"]
}

Classify:
- questions about the code ("what", "which", "how does", "list", "explain") as informational_query
- requests for diagrams, visualizations, or architecture overviews as diagram_request
- everything that asks to add, fix, change, refactor, or remove code as code_change

Return ONLY the JSON object."#;

pub struct IntentRouter {
    oracle: SharedOracle,
}

impl IntentRouter {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    /// Classify one utterance. Infallible by contract.
    pub async fn extract_intent(&self, message: &str) -> Intent {
        if let Some(oracle) = &self.oracle {
            let request = LlmRequest::new(format!("User request: {}", message))
                .with_system(CLASSIFY_PROMPT)
                .with_temperature(0.0);
            match oracle.complete(request).await {
                Ok(response) => {
                    if let Some(value) = extract_json_object(&response) {
                        match serde_json::from_value::<Intent>(value) {
                            Ok(mut intent) => {
                                if intent.description.is_empty() {
                                    intent.description = message.to_string();
                                }
                                debug!(
                                    "intent classified: {:?} ({})",
                                    intent.intent_category, intent.intent
                                );
                                return intent;
                            }
                            Err(e) => warn!("intent JSON did not deserialize: {}", e),
                        }
                    } else {
                        warn!("intent response carried no JSON object");
                    }
                }
                Err(e) => warn!("intent oracle unavailable: {}", e),
            }
        }
        keyword_fallback(message)
    }
}

/// Keyword rule-set used when the oracle is absent or unusable.
fn keyword_fallback(message: &str) -> Intent {
    let lower = message.to_lowercase();

    let category = if lower.contains("diagram")
        || lower.contains("architecture")
        || lower.contains("visualize")
        || lower.contains("visualise")
    {
        IntentCategory::DiagramRequest
    } else if lower.starts_with("what")
        || lower.starts_with("which")
        || lower.starts_with("how")
        || lower.starts_with("where")
        || lower.starts_with("list")
        || lower.starts_with("explain")
        || lower.contains("what is")
        || lower.contains("what does")
    {
        IntentCategory::InformationalQuery
    } else {
        IntentCategory::CodeChange
    };

    let mut intent = Intent::minimal(category, message);

    // Cheap tag hints shared with the orchestrator's seed search.
    for tag in ["auth", "login", "user", "payment", "order", "api", "test"] {
        if lower.contains(tag) {
            intent.target_modules.push(tag.to_string());
        }
    }

    intent
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_llm::MockOracle;
    use std::sync::Arc;

    #[tokio::test]
    async fn classifies_via_oracle_json() {
        let oracle = MockOracle::new(vec![
            r#"{"intent_category": "code_change", "intent": "add_logout", "description": "Add a logout endpoint", "constraints": [], "target_modules": ["auth"], "human_approval": true}"#,
        ]);
        let router = IntentRouter::new(Some(Arc::new(oracle)));
        let intent = router.extract_intent("add a logout endpoint").await;
        assert_eq!(intent.intent_category, IntentCategory::CodeChange);
        assert_eq!(intent.intent, "add_logout");
        assert!(intent.human_approval);
        assert_eq!(intent.target_modules, vec!["auth"]);
    }

    #[tokio::test]
    async fn falls_back_without_oracle() {
        let router = IntentRouter::new(None);

        let intent = router.extract_intent("show me a diagram of the auth flow").await;
        assert_eq!(intent.intent_category, IntentCategory::DiagramRequest);
        assert!(intent.target_modules.contains(&"auth".to_string()));

        let intent = router.extract_intent("what does auth.service.ts depend on").await;
        assert_eq!(intent.intent_category, IntentCategory::InformationalQuery);

        let intent = router.extract_intent("rename the session token field").await;
        assert_eq!(intent.intent_category, IntentCategory::CodeChange);
    }

    #[tokio::test]
    async fn falls_back_on_oracle_failure() {
        let router = IntentRouter::new(Some(Arc::new(MockOracle::failing())));
        let intent = router.extract_intent("list the endpoints").await;
        assert_eq!(intent.intent_category, IntentCategory::InformationalQuery);
    }

    #[tokio::test]
    async fn falls_back_on_non_json_response() {
        let oracle = MockOracle::new(vec!["I would classify this as a code change."]);
        let router = IntentRouter::new(Some(Arc::new(oracle)));
        let intent = router.extract_intent("what modules exist").await;
        assert_eq!(intent.intent_category, IntentCategory::InformationalQuery);
    }
}
