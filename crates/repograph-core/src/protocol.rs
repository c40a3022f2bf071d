//! Wire protocol for the bidirectional event channel
//!
//! Inbound (client → orchestrator):
//!   { "event": "chat_message", "message": "...", "repo_url": "...", "session_id": "..." }
//!   { "event": "approve_plan", "session_id": "...", "plan_id": "..." }
//!   { "event": "reject_plan",  "session_id": "...", "plan_id": "...", "reason": "..." }
//!
//! Outbound (orchestrator → client), one envelope per event:
//!   { "type": "status", "timestamp": "...", "stage": "planning", "data": {...}, "session_id": "..." }

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    ChatMessage {
        message: String,
        #[serde(default)]
        repo_url: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    ApprovePlan {
        session_id: String,
        #[serde(default)]
        plan_id: Option<String>,
    },
    RejectPlan {
        session_id: String,
        #[serde(default)]
        plan_id: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Status,
    Log,
    CodeChange,
    TestResult,
    DiagramResponse,
    QueryResponse,
    ApprovalRequest,
    Summary,
    Error,
    Connected,
}

/// Outbound envelope. `stage` names the workflow phase that produced the event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub timestamp: String,
    pub stage: String,
    pub data: serde_json::Value,
    pub session_id: String,
}

impl AgentUpdate {
    pub fn new(
        kind: UpdateKind,
        stage: impl Into<String>,
        data: serde_json::Value,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            stage: stage.into(),
            data,
            session_id: session_id.into(),
        }
    }

    pub fn status(stage: &str, message: &str, session_id: &str) -> Self {
        Self::new(
            UpdateKind::Status,
            stage,
            serde_json::json!({ "message": message }),
            session_id,
        )
    }

    pub fn log(stage: &str, data: serde_json::Value, session_id: &str) -> Self {
        Self::new(UpdateKind::Log, stage, data, session_id)
    }

    pub fn error(stage: &str, message: &str, session_id: &str) -> Self {
        Self::new(
            UpdateKind::Error,
            stage,
            serde_json::json!({ "message": message }),
            session_id,
        )
    }

    pub fn connected(session_id: &str) -> Self {
        Self::new(
            UpdateKind::Connected,
            "connection",
            serde_json::json!({ "session_id": session_id, "status": "connected" }),
            session_id,
        )
    }

    /// Whether this event may be dropped under back-pressure. Only `log`
    /// events are droppable; status and terminal events must be delivered.
    pub fn droppable(&self) -> bool {
        self.kind == UpdateKind::Log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_chat_message_parses() {
        let raw = r#"{"event":"chat_message","message":"hi","repo_url":"https://x/y.git"}"#;
        let ev: ClientEvent = serde_json::from_str(raw).unwrap();
        match ev {
            ClientEvent::ChatMessage {
                message, repo_url, ..
            } => {
                assert_eq!(message, "hi");
                assert_eq!(repo_url.as_deref(), Some("https://x/y.git"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn outbound_envelope_shape() {
        let update = AgentUpdate::status("planning", "Generating change plan...", "s-1");
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["stage"], "planning");
        assert_eq!(value["session_id"], "s-1");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn only_log_events_droppable() {
        assert!(AgentUpdate::log("x", serde_json::json!({}), "s").droppable());
        assert!(!AgentUpdate::status("x", "m", "s").droppable());
        assert!(!AgentUpdate::error("x", "m", "s").droppable());
    }
}
