use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use huddle_collab::Coordinator;
use huddle_core::protocol::{ClientMessage, ServerMessage};
use huddle_events::Unsubscribe;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::manager::{send_message, WsSender};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// HTTP handler that authenticates and upgrades the connection.
///
/// Browsers cannot set headers on a WebSocket handshake, so the access
/// token travels in the `token` query parameter. It is verified before the
/// upgrade; a bad token is a plain 401.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let user = AuthUser::from_token(&params.token, &state.config.jwt)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Field subscriptions held by one connection, keyed by
/// `(resource_type, resource_id)`. Dropping an entry stops its relay.
type FieldSubscriptions = HashMap<(String, String), Unsubscribe>;

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards queued frames to the sink.
///   3. Spawns a relay from the workspace presence channel.
///   4. Joins presence (logs `login`) and processes inbound messages.
///   5. On disconnect stops the relay, then leaves presence, which frees
///      the user's locks when this was their last session.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        conn_id = %conn_id,
        workspace_id = %user.workspace_id,
        user_id = %user.user_id,
        "WebSocket connected"
    );

    let (tx, mut rx) = state
        .ws_manager
        .add(conn_id.clone(), user.workspace_id, user.user_id)
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Subscribe before joining so this connection sees its own sync.
    let presence_rx = state.services.presence.subscribe(user.workspace_id).await;
    let presence_task = tokio::spawn(relay_presence(presence_rx, tx.clone()));

    let coordinator = state.coordinator(&user);
    coordinator.connect().await;

    let mut fields = FieldSubscriptions::new();

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(message) => dispatch(&coordinator, &tx, &mut fields, message).await,
                    Err(e) => {
                        tracing::debug!(conn_id = %conn_id, error = %e, "Malformed client message");
                        send_message(
                            &tx,
                            &ServerMessage::Error {
                                message: format!("Malformed message: {e}"),
                            },
                        );
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    drop(fields);
    // The relay holds a presence receiver; it must be gone before leaving
    // so an emptied workspace channel can be dropped.
    presence_task.abort();
    let _ = presence_task.await;
    let outcome = coordinator.disconnect().await;
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(
        conn_id = %conn_id,
        user_id = %user.user_id,
        last_session = outcome.last_session,
        "WebSocket disconnected"
    );
}

async fn dispatch(
    coordinator: &Coordinator,
    tx: &WsSender,
    fields: &mut FieldSubscriptions,
    message: ClientMessage,
) {
    let result = match message {
        ClientMessage::PresenceUpdate {
            page_path,
            resource,
        } => {
            coordinator.update_presence(&page_path, resource).await;
            Ok(())
        }
        ClientMessage::Heartbeat => coordinator.heartbeat().await.map(|renewed| {
            tracing::debug!(
                user_id = %coordinator.identity().user_id,
                renewed,
                "Heartbeat"
            );
        }),
        ClientMessage::FieldSubscribe {
            resource_type,
            resource_id,
        } => {
            let relay_tx = tx.clone();
            let (rt, rid) = (resource_type.clone(), resource_id.clone());
            coordinator
                .on_field_update(&resource_type, &resource_id, move |update| {
                    let message = ServerMessage::FieldUpdate {
                        resource_type: rt.clone(),
                        resource_id: rid.clone(),
                        update,
                    };
                    send_message(&relay_tx, &message);
                    async {}
                })
                .await
                .map(|handle| {
                    fields.insert((resource_type, resource_id), handle);
                })
        }
        ClientMessage::FieldUnsubscribe {
            resource_type,
            resource_id,
        } => {
            if let Some(handle) = fields.remove(&(resource_type, resource_id)) {
                handle.unsubscribe();
            }
            Ok(())
        }
        ClientMessage::FieldUpdate {
            resource_type,
            resource_id,
            field,
            value,
        } => coordinator
            .broadcast_field_update(&resource_type, &resource_id, &field, value)
            .await
            .map(|_| ()),
    };

    if let Err(e) = result {
        send_message(
            tx,
            &ServerMessage::Error {
                message: e.to_string(),
            },
        );
    }
}

/// Forward workspace presence changes to one connection.
async fn relay_presence(
    mut events: broadcast::Receiver<huddle_events::PresenceEvent>,
    tx: WsSender,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if !send_message(&tx, &event.to_message()) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Presence relay lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
