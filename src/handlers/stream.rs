//! Live traffic stream over WebSocket
//!
//! Each connection gets its own coordinator task. The bridge forwards
//! coordinator output as JSON text frames and drops the channel receiver when
//! the client goes away, which ends the coordinator at its next cycle boundary.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::mpsc;

use crate::logic::features::FeatureGenerator;
use crate::logic::stream::{StreamCoordinator, StreamMessage};
use crate::AppState;

const STREAM_BUFFER: usize = 8;

pub async fn traffic(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_session(socket, state))
}

async fn serve_session(mut socket: WebSocket, state: AppState) {
    let stats = std::sync::Arc::clone(&state.defense.stats);
    let ticket = stats.stream_opened();
    tracing::info!("Stream observer connected (session {}, {} active)", ticket.session, ticket.active);

    let coordinator = StreamCoordinator::new(
        state.defense.clone(),
        FeatureGenerator::new(ticket.seed(state.config.simulation_seed)),
        state.config.stream_interval,
    );

    let (tx, mut rx) = mpsc::channel::<StreamMessage>(STREAM_BUFFER);
    let session = tokio::spawn(coordinator.run(tx));

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(message) = outgoing else {
                    // Coordinator ended on its own
                    break;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode stream message: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(rx);

    match session.await {
        Ok(Ok(summary)) => tracing::debug!(
            "Stream session summary: {} cycles, {} detected, {} blocked",
            summary.cycles,
            summary.total_detected,
            summary.total_blocked
        ),
        Ok(Err(e)) => tracing::warn!("Stream session ended with error: {}", e),
        Err(e) => tracing::error!("Stream session task failed: {}", e),
    }

    let remaining = stats.stream_closed();
    tracing::info!("Stream observer disconnected ({} active)", remaining);
}
