//! WebSocket handler for placements and live canvas events.

use crate::identity::ClientIdentity;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tracing::{debug, info, warn};

/// WebSocket upgrade handler for /ws.
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    identity: ClientIdentity,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle one connection until either side closes it.
async fn handle_socket(mut socket: WebSocket, state: AppState, identity: ClientIdentity) {
    let (handle, mut rx) = state.transport.connect().await;
    let registry = state.pipeline.registry();
    if let Err(e) = registry.register(&handle).await {
        // Still serve the client; it just won't receive broadcasts.
        warn!("Could not register connection {}: {}", handle, e);
    }
    info!("Client connected: {} ({})", identity.as_str(), handle);

    loop {
        tokio::select! {
            // Broadcast events addressed to this connection
            event = rx.recv() => {
                match event {
                    Some(payload) => {
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = reply_to(&state, &identity, &text).await;
                        match reply.to_json() {
                            Ok(json) => {
                                if socket.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Could not encode reply: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Socket error on {}: {}", handle, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.transport.disconnect(&handle).await;
    if let Err(e) = registry.unregister(&handle).await {
        warn!("Could not unregister connection {}: {}", handle, e);
    }
    info!("Client disconnected: {} ({})", identity.as_str(), handle);
}

/// Answer one client frame.
pub(crate) async fn reply_to(state: &AppState, identity: &ClientIdentity, text: &str) -> ServerMessage {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::PlacePixel(mut request)) => {
            request.identity = identity.0.clone();
            ServerMessage::placed(&state.pipeline.place(request).await)
        }
        Ok(ClientMessage::GetCooldown) => match state.pipeline.cooldown(identity.as_str()).await {
            Ok(status) => ServerMessage::CooldownStatus(status),
            Err(e) => ServerMessage::error(e.to_string()),
        },
        Err(message) => ServerMessage::error(message),
    }
}
