use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Testroom Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::promote_member,
        crate::routes::rooms::list_lines,
        crate::routes::rooms::toggle_progress,
        crate::routes::rooms::leaderboard,
        crate::routes::issues::list_issues,
        crate::routes::issues::create_issue,
        crate::routes::issues::update_status,
        crate::routes::issues::link_ticket,
        crate::routes::issues::delete_issue,
        crate::routes::sse::room_events,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::RoomSummary,
            crate::dto::room::MembershipSummary,
            crate::dto::room::ScriptLineSummary,
            crate::dto::room::ToggleProgressRequest,
            crate::dto::room::ProgressSummary,
            crate::dto::room::LeaderboardEntry,
            crate::dto::issue::CreateIssueRequest,
            crate::dto::issue::IssueSummary,
            crate::dto::issue::UpdateStatusRequest,
            crate::dto::issue::TicketLinkResponse,
            crate::dto::events::RoomEvent,
            crate::dto::ws::RealtimeInbound,
            crate::dto::ws::RealtimeControl,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Rooms and memberships"),
        (name = "progress", description = "Script lines, progress and leaderboard"),
        (name = "issues", description = "Issue lifecycle and ticket mirroring"),
        (name = "realtime", description = "Room event streams over WebSocket or SSE"),
    )
)]
pub struct ApiDoc;
