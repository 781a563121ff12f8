//! WebSocket endpoint for live reading updates

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::{ApiResult, AppState};
use crate::errors::RescueRadarError;

/// Upgrade to a WebSocket that receives `{"reading": ...}` after every upsert
pub(super) async fn live_updates(
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let notifier = state.notifier.ok_or_else(|| {
        RescueRadarError::FeatureUnavailableError("Live updates not available".to_string())
    })?;
    let ws = ws.ok_or_else(|| RescueRadarError::validation("WebSocket upgrade required"))?;

    let updates = notifier.subscribe();
    info!("Live listener connected ({} total)", notifier.listener_count());
    Ok(ws.on_upgrade(move |socket| forward_updates(socket, updates)))
}

async fn forward_updates(socket: WebSocket, mut updates: broadcast::Receiver<String>) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Live listener fell behind, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Inbound frames are ignored; reading them only detects the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!("Live listener disconnected");
}
