use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{events::RoomEvent, ws::RealtimeControl},
    error::ServiceError,
    services::access::Identity,
    state::SharedState,
};

/// Subscribe a members-only SSE stream to a room.
///
/// The first event (`connected`) carries the connection id to echo in `X-Connection-Id`.
pub async fn room_stream(
    state: SharedState,
    identity: Identity,
    room_id: Uuid,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    state.guard().require_member(room_id, identity.user_id).await?;

    let connection_id = Uuid::new_v4();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RoomEvent>();
    state
        .hub()
        .join(connection_id, room_id, identity.user_id, event_tx);

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads room events and pushes into mpsc
    tokio::spawn(async move {
        if let Some(event) = connected_event(connection_id) {
            if tx.send(Ok(event)).await.is_err() {
                state.hub().leave(connection_id);
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                received = event_rx.recv() => {
                    let Some(room_event) = received else { break };
                    let data = match serde_json::to_string(&room_event) {
                        Ok(data) => data,
                        Err(err) => {
                            warn!(error = %err, event = room_event.name(), "failed to serialize room event");
                            continue;
                        }
                    };
                    let event = Event::default().event(room_event.name()).data(data);
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }

        state.hub().leave(connection_id);
        info!(connection = %connection_id, room = %room_id, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

fn connected_event(connection_id: Uuid) -> Option<Event> {
    match serde_json::to_string(&RealtimeControl::Connected { connection_id }) {
        Ok(data) => Some(Event::default().event("connected").data(data)),
        Err(err) => {
            warn!(error = %err, "failed to serialize control message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dto::room::CreateRoomRequest, services::test_support::app_state};

    #[tokio::test]
    async fn strangers_cannot_subscribe_to_a_room_stream() {
        let state = app_state();
        let owner = Identity::new(Uuid::new_v4());
        let room_id = state
            .rooms()
            .create_room(
                &owner,
                CreateRoomRequest {
                    name: "Streamed".into(),
                    template_script_id: None,
                    status_tags: None,
                },
            )
            .await
            .unwrap()
            .id;

        let refused = room_stream(state.clone(), Identity::new(Uuid::new_v4()), room_id).await;
        assert!(matches!(refused, Err(ServiceError::Forbidden(_))));
        assert_eq!(state.hub().connection_count(), 0);

        let accepted = room_stream(state.clone(), owner, room_id).await;
        assert!(accepted.is_ok());
        assert_eq!(state.hub().connection_count(), 1);
    }
}
