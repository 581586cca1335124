use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::room::{
        CreateRoomRequest, LeaderboardEntry, MembershipSummary, ProgressSummary, RoomSummary,
        ScriptLineSummary, ToggleProgressRequest,
    },
    error::AppError,
    routes::identity::Caller,
    state::SharedState,
};

/// Routes handling rooms, memberships and script progress.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/members/{user_id}/groupier", post(promote_member))
        .route("/rooms/{id}/lines", get(list_lines))
        .route("/rooms/{id}/lines/{line_id}/progress", put(toggle_progress))
        .route("/rooms/{id}/leaderboard", get(leaderboard))
}

/// List the rooms the caller belongs to.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Rooms of the caller", body = [RoomSummary]),
        (status = 401, description = "Missing identity")
    )
)]
pub async fn list_rooms(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    let rooms = state.rooms().list_rooms(&caller.identity).await?;
    Ok(Json(rooms))
}

/// Create a room, optionally cloning a template script. The caller becomes groupier.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomSummary),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Template script not found")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomSummary>), AppError> {
    let room = state.rooms().create_room(&caller.identity, payload).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// Join a room, or refresh the caller's membership.
#[utoipa::path(
    post,
    path = "/rooms/{id}/join",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Membership", body = MembershipSummary),
        (status = 404, description = "Room not found")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<MembershipSummary>, AppError> {
    let membership = state.rooms().join_room(&caller.identity, id).await?;
    Ok(Json(membership))
}

/// Promote a member to groupier.
#[utoipa::path(
    post,
    path = "/rooms/{id}/members/{user_id}/groupier",
    tag = "rooms",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("user_id" = Uuid, Path, description = "Member to promote")
    ),
    responses(
        (status = 200, description = "Updated membership", body = MembershipSummary),
        (status = 403, description = "Caller is not a groupier"),
        (status = 404, description = "User is not a member")
    )
)]
pub async fn promote_member(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MembershipSummary>, AppError> {
    let membership = state
        .rooms()
        .promote_member(&caller.identity, id, user_id)
        .await?;
    Ok(Json(membership))
}

/// Script lines of the room with the caller's progress.
#[utoipa::path(
    get,
    path = "/rooms/{id}/lines",
    tag = "progress",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Script lines", body = [ScriptLineSummary]),
        (status = 403, description = "Not a member")
    )
)]
pub async fn list_lines(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScriptLineSummary>>, AppError> {
    let lines = state.rooms().list_lines(&caller.identity, id).await?;
    Ok(Json(lines))
}

/// Check, uncheck or annotate a script line.
#[utoipa::path(
    put,
    path = "/rooms/{id}/lines/{line_id}/progress",
    tag = "progress",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("line_id" = Uuid, Path, description = "Script line identifier")
    ),
    request_body = ToggleProgressRequest,
    responses(
        (status = 200, description = "Progress saved", body = ProgressSummary),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Line not part of the room")
    )
)]
pub async fn toggle_progress(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
    Valid(Json(payload)): Valid<Json<ToggleProgressRequest>>,
) -> Result<Json<ProgressSummary>, AppError> {
    let origin = caller.origin(state.hub());
    let progress = state
        .rooms()
        .toggle_progress(&caller.identity, id, line_id, payload, origin)
        .await?;
    Ok(Json(progress))
}

/// Members ranked by checked script lines.
#[utoipa::path(
    get,
    path = "/rooms/{id}/leaderboard",
    tag = "progress",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Leaderboard", body = [LeaderboardEntry]),
        (status = 403, description = "Not a member")
    )
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let board = state.rooms().leaderboard(&caller.identity, id).await?;
    Ok(Json(board))
}
