//! WebSocket feed of the activity event bus.
//!
//! A client first receives one `snapshot` frame with every tracked agent,
//! then each `ActivityEvent` as a JSON text frame.

use crate::state::AppState;
use agentscope_types::{ActivityEvent, AgentSnapshot};
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum InitialFrame<'a> {
    Snapshot { agents: &'a [AgentSnapshot] },
}

pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    if let Err(e) = handle_events_websocket(socket, state).await {
        tracing::warn!(target: "agentscope::ws", error = %e, "Event WebSocket error");
    }
}

pub async fn handle_events_websocket(socket: WebSocket, state: Arc<AppState>) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before taking the snapshot so nothing falls in between.
    let mut events = BroadcastStream::new(state.monitor.subscribe());
    let agents = state.monitor.snapshot().await?;
    let initial = serde_json::to_string(&InitialFrame::Snapshot { agents: &agents })?;
    ws_tx.send(Message::Text(initial.into())).await?;
    tracing::info!(target: "agentscope::ws", agents = agents.len(), "Event client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(item) = events.next().await {
            let event: ActivityEvent = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "agentscope::ws", skipped, "Event client lagging, events dropped");
                    continue;
                }
            };
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(_) => continue,
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(target: "agentscope::ws", "Event client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_frame_shape() {
        let frame = serde_json::to_value(InitialFrame::Snapshot { agents: &[] }).unwrap();
        assert_eq!(frame, serde_json::json!({"type": "snapshot", "agents": []}));
    }
}
