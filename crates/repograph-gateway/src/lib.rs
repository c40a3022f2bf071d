//! repograph-gateway — the orchestrator state machine and its WebSocket
//! transport
//!
//! Each client conversation is one session: a logically sequential state
//! machine whose phases stream progress events over a bounded channel the
//! transport drains. Concurrency exists across sessions, never within one.

pub mod orchestrator;
pub mod server;
pub mod session;
pub mod ws;

pub use orchestrator::Orchestrator;
pub use server::{start_server, ServerConfig};
pub use session::{Session, SessionRegistry};
