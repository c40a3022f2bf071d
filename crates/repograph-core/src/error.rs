//! Error types for repograph

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("clone failed: {url} - {message}")]
    CloneFailed { url: String, message: String },

    #[error("pkg error: {0}")]
    PkgError(String),

    #[error("graph store error: {0}")]
    GraphStore(String),

    #[error("llm error: {provider} - {message}")]
    LlmError { provider: String, message: String },

    #[error("subprocess failed: {command} - {message}")]
    Subprocess { command: String, message: String },

    #[error("subprocess timed out after {seconds}s: {command}")]
    SubprocessTimeout { command: String, seconds: u64 },

    #[error("host api error: {0}")]
    HostApi(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn pkg(message: impl Into<String>) -> Self {
        Self::PkgError(message.into())
    }

    pub fn graph_store(message: impl Into<String>) -> Self {
        Self::GraphStore(message.into())
    }

    pub fn llm(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn subprocess(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subprocess {
            command: command.into(),
            message: message.into(),
        }
    }

    /// The workflow stage an error belongs to, for the outbound `error` event.
    pub fn stage_hint(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) | Self::PlanNotFound(_) => "approval",
            Self::CloneFailed { .. } => "repo_loading",
            Self::PkgError(_) | Self::GraphStore(_) => "pkg_generation",
            Self::LlmError { .. } => "processing",
            Self::Subprocess { .. } | Self::SubprocessTimeout { .. } => "testing",
            Self::HostApi(_) => "pr_creation",
            Self::Validation(_) => "editing",
            _ => "processing",
        }
    }
}
