//! Runtime configuration, read once from the environment

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Approval gate default; intents and impact results can only add to it.
    pub approval_required: bool,
    pub test_timeout_secs: u64,
    pub lint_timeout_secs: u64,
    pub pkg_fan_threshold: usize,
    pub clone_root: PathBuf,
    pub graph_db: GraphDbConfig,
    pub llm: LlmConfig,
    pub git_user_name: String,
    pub git_user_email: String,
    /// Code-host API token; absent means PR creation is skipped.
    pub host_api_token: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphDbConfig {
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub batch_size: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            approval_required: true,
            test_timeout_secs: 300,
            lint_timeout_secs: 60,
            pkg_fan_threshold: 3,
            clone_root: PathBuf::from("./cloned_repos"),
            graph_db: GraphDbConfig {
                uri: None,
                user: None,
                password: None,
                database: "repos".to_string(),
                max_retries: 3,
                retry_delay_ms: 500,
                batch_size: 1000,
            },
            llm: LlmConfig {
                api_key: None,
                model: None,
                temperature: 0.3,
                max_tokens: 2000,
            },
            git_user_name: "Agent".to_string(),
            git_user_email: "agent@example.com".to_string(),
            host_api_token: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            approval_required: std::env::var("AGENT_APPROVAL_REQUIRED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            test_timeout_secs: env_parse("TEST_RUNNER_TIMEOUT", defaults.test_timeout_secs),
            lint_timeout_secs: defaults.lint_timeout_secs,
            pkg_fan_threshold: env_parse("PKG_FAN_THRESHOLD", defaults.pkg_fan_threshold),
            clone_root: env_opt("CLONE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.clone_root),
            graph_db: GraphDbConfig {
                uri: env_opt("GRAPH_DB_URI"),
                user: env_opt("GRAPH_DB_USER"),
                password: env_opt("GRAPH_DB_PASSWORD"),
                database: env_opt("GRAPH_DB_DATABASE").unwrap_or(defaults.graph_db.database),
                max_retries: env_parse("GRAPH_DB_MAX_RETRIES", defaults.graph_db.max_retries),
                retry_delay_ms: env_parse("GRAPH_DB_RETRY_DELAY_MS", defaults.graph_db.retry_delay_ms),
                batch_size: env_parse("GRAPH_DB_BATCH_SIZE", defaults.graph_db.batch_size),
            },
            llm: LlmConfig {
                api_key: env_opt("ANTHROPIC_API_KEY"),
                model: env_opt("LLM_MODEL"),
                temperature: env_parse("LLM_TEMPERATURE", defaults.llm.temperature),
                max_tokens: env_parse("LLM_MAX_TOKENS", defaults.llm.max_tokens),
            },
            git_user_name: env_opt("GIT_USER_NAME").unwrap_or(defaults.git_user_name),
            git_user_email: env_opt("GIT_USER_EMAIL").unwrap_or(defaults.git_user_email),
            host_api_token: env_opt("HOST_API_TOKEN"),
        }
    }
}
