use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::issue::{CreateIssueRequest, IssueSummary, TicketLinkResponse, UpdateStatusRequest},
    error::AppError,
    routes::identity::Caller,
    services::attachments::UploadedFile,
    state::SharedState,
};

/// Upper bound for one issue upload, attachments included.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const FIELDS_PART: &str = "fields";
const FILE_PART: &str = "file";

/// Routes handling issues and their ticket mirroring.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{id}/issues",
            get(list_issues)
                .post(create_issue)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/issues/{id}/status", put(update_status))
        .route("/issues/{id}/ticket", post(link_ticket))
        .route("/issues/{id}", delete(delete_issue))
}

/// Issues of a room ordered by script line, then creation time.
#[utoipa::path(
    get,
    path = "/rooms/{id}/issues",
    tag = "issues",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Issues of the room", body = [IssueSummary]),
        (status = 403, description = "Not a member")
    )
)]
pub async fn list_issues(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<IssueSummary>>, AppError> {
    let issues = state.issues().list_issues(&caller.identity, id).await?;
    Ok(Json(issues))
}

/// File an issue. The `fields` part holds the JSON fields, each `file` part one attachment.
#[utoipa::path(
    post,
    path = "/rooms/{id}/issues",
    tag = "issues",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body(content = CreateIssueRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Issue created", body = IssueSummary),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Not a member")
    )
)]
pub async fn create_issue(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<IssueSummary>), AppError> {
    let (fields, files) = read_upload(multipart).await?;
    let origin = caller.origin(state.hub());
    let issue = state
        .issues()
        .create_issue(&caller.identity, id, fields, files, origin)
        .await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

/// Set or clear the status of an issue. Groupiers only.
#[utoipa::path(
    put,
    path = "/issues/{id}/status",
    tag = "issues",
    params(("id" = Uuid, Path, description = "Issue identifier")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Issue updated", body = IssueSummary),
        (status = 400, description = "Status not configured for the room"),
        (status = 403, description = "Caller is not a groupier"),
        (status = 404, description = "Issue not found")
    )
)]
pub async fn update_status(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<IssueSummary>, AppError> {
    let origin = caller.origin(state.hub());
    let issue = state
        .issues()
        .update_status(&caller.identity, id, payload, origin)
        .await?;
    Ok(Json(issue))
}

/// Mirror an issue into the ticket tracker, at most once.
#[utoipa::path(
    post,
    path = "/issues/{id}/ticket",
    tag = "issues",
    params(("id" = Uuid, Path, description = "Issue identifier")),
    responses(
        (status = 200, description = "Ticket key of the issue", body = TicketLinkResponse),
        (status = 403, description = "Caller is neither creator nor groupier"),
        (status = 502, description = "Tracker rejected the ticket"),
        (status = 503, description = "Tracker unavailable")
    )
)]
pub async fn link_ticket(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketLinkResponse>, AppError> {
    let origin = caller.origin(state.hub());
    let link = state
        .issues()
        .link_ticket(&caller.identity, id, origin)
        .await?;
    Ok(Json(link))
}

/// Delete an issue. Creator or groupier only.
#[utoipa::path(
    delete,
    path = "/issues/{id}",
    tag = "issues",
    params(("id" = Uuid, Path, description = "Issue identifier")),
    responses(
        (status = 204, description = "Issue deleted"),
        (status = 403, description = "Caller is neither creator nor groupier"),
        (status = 404, description = "Issue not found")
    )
)]
pub async fn delete_issue(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let origin = caller.origin(state.hub());
    state
        .issues()
        .delete_issue(&caller.identity, id, origin)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_upload(
    mut multipart: Multipart,
) -> Result<(CreateIssueRequest, Vec<UploadedFile>), AppError> {
    let malformed = |err: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("malformed upload: {err}"))
    };

    let mut fields = None;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FIELDS_PART) => {
                let bytes = field.bytes().await.map_err(malformed)?;
                let parsed = serde_json::from_slice::<CreateIssueRequest>(&bytes)
                    .map_err(|err| AppError::BadRequest(format!("invalid issue fields: {err}")))?;
                fields = Some(parsed);
            }
            Some(FILE_PART) => {
                let file_name = field.file_name().unwrap_or("attachment").to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    files.push(UploadedFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((fields.unwrap_or_default(), files))
}
