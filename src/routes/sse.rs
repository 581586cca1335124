use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError, routes::identity::Caller, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "realtime",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room event stream", content_type = "text/event-stream", body = String),
        (status = 403, description = "Not a member")
    )
)]
/// Stream the events of one room to a member.
pub async fn room_events(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let user_id = caller.identity.user_id;
    let stream = sse_service::room_stream(state, caller.identity, id).await?;
    info!(room = %id, user = %user_id, "new room SSE connection");
    Ok(stream)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{id}/events", get(room_events))
}
