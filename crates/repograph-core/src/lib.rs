//! Repograph Core - Types, configuration, wire protocol, and error handling

pub mod config;
pub mod error;
pub mod intent;
pub mod pkg;
pub mod plan;
pub mod protocol;

pub use config::AgentConfig;
pub use error::{Error, Result};
pub use intent::*;
pub use pkg::*;
pub use plan::*;
pub use protocol::*;
