use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{routes::identity::Caller, services::realtime_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "realtime",
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing identity")
    )
)]
/// Upgrade the HTTP connection into a realtime session. Send `{"type":"join","room_id":..}`
/// to start receiving a room's events.
pub async fn ws_handler(
    State(state): State<SharedState>,
    caller: Caller,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = caller.identity;
    ws.on_upgrade(move |socket| realtime_service::handle_socket(state, socket, identity))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
