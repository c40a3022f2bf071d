//! LLM oracle trait

use std::sync::Arc;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// A completion request. The oracle is opaque: prompt text in, text out.
#[derive(Clone, Debug, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait::async_trait]
pub trait LlmOracle: Send + Sync {
    fn name(&self) -> &str;

    /// Complete a prompt and return the full response text.
    async fn complete(&self, request: LlmRequest) -> LlmResult<String>;
}

/// Optional shared oracle handle; `None` means every consumer takes its
/// deterministic fallback path.
pub type SharedOracle = Option<Arc<dyn LlmOracle>>;

/// Strip surrounding Markdown code fences from an oracle response.
/// Oracles frequently wrap file contents or JSON in ``` blocks even when
/// told not to.
pub fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim() == "```" {
            lines.pop();
        }
    }
    lines.join("\n")
}

/// Extract the first JSON object from a response that may carry prose
/// around it.
pub fn extract_json_object(content: &str) -> Option<serde_json::Value> {
    let stripped = strip_code_fences(content);
    let start = stripped.find('{')?;
    let bytes = stripped.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&stripped[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fences("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn extracts_embedded_json() {
        let content = "Here is the plan:\n```json\n{\"tasks\": [{\"task\": \"a {nested} brace\"}]}\n```\nDone.";
        let value = extract_json_object(content).unwrap();
        assert!(value["tasks"].is_array());
    }

    #[test]
    fn extract_json_handles_strings_with_braces() {
        let content = r#"{"a": "close } brace", "b": 2}"#;
        let value = extract_json_object(content).unwrap();
        assert_eq!(value["b"], 2);
    }
}
