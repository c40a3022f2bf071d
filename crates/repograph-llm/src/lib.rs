//! repograph-llm — the text-in/text-out oracle boundary
//!
//! Every agent that needs language-model output talks to the `LlmOracle`
//! trait and must keep working when no oracle is configured.

pub mod anthropic;
pub mod mock;
pub mod provider;

pub use anthropic::AnthropicOracle;
pub use mock::MockOracle;
pub use provider::{LlmError, LlmOracle, LlmRequest, LlmResult, SharedOracle};
