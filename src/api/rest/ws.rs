use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::state::AppState;

/// Change feed for UIs: one text frame per collection change, carrying only
/// the store key. Clients re-fetch the collection; the frame has no payload
/// to merge.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut notices = BroadcastStream::new(state.store.subscribe());

    info!("change feed client connected");

    let send_task = tokio::spawn(async move {
        // A lagged stream item just means missed notices; the client reloads
        // on the next frame anyway, so skip and keep going.
        while let Some(item) = notices.next().await {
            let Ok(notice) = item else { continue };
            let frame = json!({ "key": notice.key }).to_string();
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("change feed client disconnected");
}
