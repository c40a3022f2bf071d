//! WebSocket transport — one connection per session
//!
//! On connect the server reserves a session and emits
//! `connected{session_id, status}`. Inbound events dispatch to the
//! orchestrator; outbound events drain from the session channel in
//! emission order. Disconnect cancels in-flight work and evicts the
//! session.

use crate::orchestrator::Orchestrator;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use repograph_core::{AgentUpdate, ClientEvent};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn handle_connection(socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let session_id = uuid::Uuid::new_v4().to_string();
    let (session, mut events) = orchestrator.sessions.create(&session_id);

    // Connection confirmation goes out before anything else.
    let connected = AgentUpdate::connected(&session_id);
    if let Ok(json) = serde_json::to_string(&connected) {
        if ws_tx.send(WsMessage::Text(json)).await.is_err() {
            orchestrator.sessions.remove(&session_id);
            return;
        }
    }
    info!("websocket connected: session {}", session_id);

    loop {
        tokio::select! {
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                dispatch(event, &session, &orchestrator).await;
                            }
                            Err(e) => {
                                warn!("unparseable client event: {}", e);
                                session
                                    .error("connection", &format!("Invalid message format: {}", e))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Binary, Ping, Pong — ignore
                    Some(Err(e)) => {
                        warn!("websocket error: {}", e);
                        break;
                    }
                }
            }

            outbound = events.recv() => {
                match outbound {
                    Some(update) => {
                        if let Ok(json) = serde_json::to_string(&update) {
                            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    info!("websocket disconnected: session {}", session_id);
    orchestrator.sessions.remove(&session_id);
}

/// Route one inbound event. Chat messages run as their own task so the
/// socket keeps draining outbound events during long phases.
async fn dispatch(
    event: ClientEvent,
    connection: &Arc<crate::session::Session>,
    orchestrator: &Arc<Orchestrator>,
) {
    match event {
        ClientEvent::ChatMessage {
            message,
            repo_url,
            session_id,
        } => {
            let target = session_id.unwrap_or_else(|| connection.session_id.clone());
            let Some(session) = orchestrator.sessions.get(&target) else {
                warn!("chat_message for unknown session {}", target);
                connection.error("connection", "Session not found").await;
                return;
            };
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .process_user_request(&session, &message, repo_url)
                    .await;
            });
        }
        ClientEvent::ApprovePlan {
            session_id,
            plan_id,
        } => {
            if orchestrator.sessions.get(&session_id).is_none() {
                warn!("approve_plan for unknown session {}", session_id);
                connection.error("approval", "Session not found").await;
                return;
            }
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .approve_plan(&session_id, plan_id.as_deref())
                    .await;
            });
        }
        ClientEvent::RejectPlan {
            session_id,
            plan_id,
            reason,
        } => {
            if orchestrator.sessions.get(&session_id).is_none() {
                warn!("reject_plan for unknown session {}", session_id);
                connection.error("approval", "Session not found").await;
                return;
            }
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .reject_plan(&session_id, plan_id.as_deref(), reason.as_deref())
                    .await;
            });
        }
    }
}
