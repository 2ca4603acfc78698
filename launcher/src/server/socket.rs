//! Socket endpoint for live deployment logs

use std::sync::Arc;

use api_models::{ClientMessage, ServerMessage};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::relay::{Outbox, SubscriberId};
use crate::server::handlers::owned_deployment;
use crate::server::state::ServerState;
use crate::session::{AuthSession, MaybeSession};

/// Upgrade to a socket; the session cookie of the upgrade request authenticates it
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    MaybeSession(session): MaybeSession,
) -> impl IntoResponse {
    let auth = match session {
        Some(id) => state.sessions.auth_session(&id).await,
        None => None,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>, auth: Option<AuthSession>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();
    let subscriber = state.relay.next_subscriber_id();
    debug!("Socket {} connected", subscriber);

    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize socket message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Socket {} error: {}", subscriber, e);
                break;
            }
        };

        match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(message) => {
                handle_message(&state, auth.as_ref(), subscriber, &outbox, message).await;
            }
            Err(e) => {
                warn!("Invalid socket message from {}: {}", subscriber, e);
                send_error(&outbox, "Invalid message");
            }
        }
    }

    state.relay.unsubscribe_all(subscriber);
    drop(outbox);
    if let Err(e) = writer.await {
        error!("Socket {} writer failed: {}", subscriber, e);
    }
    debug!("Socket {} closed", subscriber);
}

async fn handle_message(
    state: &Arc<ServerState>,
    auth: Option<&AuthSession>,
    subscriber: SubscriberId,
    outbox: &Outbox,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Subscribe { deployment_id } => {
            let Some(auth) = auth else {
                send_error(outbox, "Not authenticated");
                return;
            };
            match owned_deployment(state, auth, &deployment_id).await {
                Ok(deployment) => {
                    state.relay.subscribe(
                        &deployment.id,
                        subscriber,
                        outbox.clone(),
                        auth.github(&state.github),
                    );
                }
                Err(e) => send_error(outbox, &e.user_message()),
            }
        }
        ClientMessage::Unsubscribe { deployment_id } => {
            state.relay.unsubscribe(&deployment_id, subscriber);
        }
        ClientMessage::Ping => {
            let _ = outbox.send(ServerMessage::Pong);
        }
    }
}

fn send_error(outbox: &Outbox, message: &str) {
    let _ = outbox.send(ServerMessage::Error {
        message: message.to_string(),
    });
}
