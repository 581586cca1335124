use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::RoomEvent,
        ws::{RealtimeControl, RealtimeInbound},
    },
    services::access::Identity,
    state::{SharedState, hub::EventSender},
};

/// Writer channel closed; the connection is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle of one realtime WebSocket connection.
///
/// The connection receives no room events until it sends a `join` for a room the caller is
/// a member of.
pub async fn handle_socket(state: SharedState, socket: WebSocket, identity: Identity) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RoomEvent>();

    // Dedicated writer task keeps room events flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(message) = outbound_rx.recv() => message,
                Some(event) = event_rx.recv() => match serde_json::to_string(&event) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(error = %err, event = event.name(), "failed to serialize room event");
                        continue;
                    }
                },
                else => break,
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(connection = %connection_id, user = %identity.user_id, "realtime connection opened");
    if send_control(&outbound_tx, &RealtimeControl::Connected { connection_id }).is_err() {
        finalize(writer_task, outbound_tx, event_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match RealtimeInbound::from_json_str(&text) {
                    Ok(RealtimeInbound::Join { room_id }) => {
                        join_room(&state, &identity, connection_id, room_id, event_tx.clone())
                            .await
                    }
                    Ok(RealtimeInbound::Leave) => {
                        state.hub().leave(connection_id);
                        RealtimeControl::Left
                    }
                    Err(err) => {
                        warn!(connection = %connection_id, error = %err, "failed to parse realtime message");
                        RealtimeControl::Error {
                            message: "expected a `join` or `leave` message".into(),
                        }
                    }
                };
                if send_control(&outbound_tx, &reply).is_err() {
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.hub().leave(connection_id);
    info!(connection = %connection_id, "realtime connection closed");

    finalize(writer_task, outbound_tx, event_tx).await;
}

/// Subscribe a connection to a room the caller is a member of.
///
/// Refused joins leave any previous subscription of the connection untouched.
pub(crate) async fn join_room(
    state: &SharedState,
    identity: &Identity,
    connection_id: Uuid,
    room_id: Uuid,
    tx: EventSender,
) -> RealtimeControl {
    match state
        .guard()
        .require_member(room_id, identity.user_id)
        .await
    {
        Ok(_) => {
            state
                .hub()
                .join(connection_id, room_id, identity.user_id, tx);
            RealtimeControl::Joined { room_id }
        }
        Err(err) => {
            debug!(connection = %connection_id, room = %room_id, error = %err, "join refused");
            RealtimeControl::Error {
                message: err.to_string(),
            }
        }
    }
}

fn send_control(
    tx: &mpsc::UnboundedSender<Message>,
    control: &RealtimeControl,
) -> Result<(), ConnectionClosed> {
    let payload = match serde_json::to_string(control) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize control message `{control:?}`");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    event_tx: mpsc::UnboundedSender<RoomEvent>,
) {
    drop(outbound_tx);
    drop(event_tx);
    let _ = writer_task.await;
}
