//! Session registry — one entry per client conversation
//!
//! The registry is a process-wide concurrent map; only the owning session
//! mutates its entry, so writes are serialized per key. The event channel
//! is bounded: `log` events are dropped under back-pressure, status and
//! terminal events are always awaited.

use dashmap::DashMap;
use repograph_core::pkg::Pkg;
use repograph_core::{AgentUpdate, Intent, Plan};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct SessionState {
    pub repo_url: Option<String>,
    pub repo_path: Option<PathBuf>,
    pub pkg: Option<Arc<Pkg>>,
    pub current_intent: Option<Intent>,
    pub current_plan: Option<Plan>,
    pub pending_approval: Option<String>,
}

pub struct Session {
    pub session_id: String,
    pub state: RwLock<SessionState>,
    /// Cancelled on client disconnect; in-flight phase work observes it.
    pub cancel: CancellationToken,
    /// Serializes turns within the session: phases never interleave.
    pub turn_lock: Mutex<()>,
    events: mpsc::Sender<AgentUpdate>,
}

impl Session {
    fn new(session_id: String) -> (Arc<Self>, mpsc::Receiver<AgentUpdate>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = Arc::new(Self {
            session_id,
            state: RwLock::new(SessionState::default()),
            cancel: CancellationToken::new(),
            turn_lock: Mutex::new(()),
            events,
        });
        (session, rx)
    }

    /// Emit an event to the client. Under back-pressure, droppable events
    /// (`log`) are discarded in preference to losing status or terminal
    /// events.
    pub async fn emit(&self, update: AgentUpdate) {
        if update.droppable() {
            if let Err(e) = self.events.try_send(update) {
                debug!("dropped log event for {}: {}", self.session_id, e);
            }
        } else {
            let _ = self.events.send(update).await;
        }
    }

    pub async fn status(&self, stage: &str, message: &str) {
        self.emit(AgentUpdate::status(stage, message, &self.session_id))
            .await;
    }

    pub async fn log(&self, stage: &str, data: serde_json::Value) {
        self.emit(AgentUpdate::log(stage, data, &self.session_id))
            .await;
    }

    pub async fn error(&self, stage: &str, message: &str) {
        self.emit(AgentUpdate::error(stage, message, &self.session_id))
            .await;
    }
}

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Reserve a session and hand back the event receiver for the
    /// transport to drain.
    pub fn create(&self, session_id: &str) -> (Arc<Session>, mpsc::Receiver<AgentUpdate>) {
        let (session, rx) = Session::new(session_id.to_string());
        self.sessions.insert(session_id.to_string(), session.clone());
        info!("session {} created", session_id);
        (session, rx)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Evict a session on disconnect, cancelling its in-flight work.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(session_id).map(|(_, s)| s);
        if let Some(session) = &removed {
            session.cancel.cancel();
            info!("session {} evicted", session_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::UpdateKind;

    #[tokio::test]
    async fn create_get_remove() {
        let registry = SessionRegistry::new();
        let (session, _rx) = registry.create("s-1");
        assert_eq!(session.session_id, "s-1");
        assert!(registry.get("s-1").is_some());
        assert!(registry.get("s-2").is_none());

        let removed = registry.remove("s-1").unwrap();
        assert!(removed.cancel.is_cancelled());
        assert!(registry.get("s-1").is_none());
    }

    #[tokio::test]
    async fn events_flow_through_channel() {
        let registry = SessionRegistry::new();
        let (session, mut rx) = registry.create("s-1");
        session.status("planning", "working").await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, UpdateKind::Status);
        assert_eq!(event.stage, "planning");
    }

    #[tokio::test]
    async fn log_events_dropped_when_full() {
        let registry = SessionRegistry::new();
        let (session, mut rx) = registry.create("s-1");

        // Saturate the channel with log events, then emit one more of each
        // kind: the extra log is dropped, the status is delivered once the
        // reader drains.
        for i in 0..512 {
            session
                .log("noise", serde_json::json!({ "i": i }))
                .await;
        }

        let emitter = session.clone();
        let status_task = tokio::spawn(async move {
            emitter.status("planning", "must arrive").await;
        });

        let mut saw_status = false;
        let mut received = 0usize;
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv()).await
        {
            received += 1;
            if event.kind == UpdateKind::Status {
                saw_status = true;
                break;
            }
        }
        status_task.await.unwrap();
        assert!(saw_status, "status event must survive back-pressure");
        // Some of the 512 logs were dropped.
        assert!(received <= 257, "expected drops, got {} events", received);
    }
}
