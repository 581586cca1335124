use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{issue::IssueSummary, room::ProgressSummary};

const EVENT_ISSUE_CREATED: &str = "issue.created";
const EVENT_ISSUE_UPDATED: &str = "issue.updated";
const EVENT_ISSUE_DELETED: &str = "issue.deleted";
const EVENT_PROGRESS_CHANGED: &str = "progress.changed";

/// State change published to every other connection of a room.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum RoomEvent {
    #[serde(rename = "issue.created")]
    IssueCreated(IssueSummary),
    #[serde(rename = "issue.updated")]
    IssueUpdated(IssueSummary),
    /// Only the identifier survives a deletion.
    #[serde(rename = "issue.deleted")]
    IssueDeleted { id: Uuid },
    #[serde(rename = "progress.changed")]
    ProgressChanged(ProgressSummary),
}

impl RoomEvent {
    /// Event name used by the SSE transport.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IssueCreated(_) => EVENT_ISSUE_CREATED,
            Self::IssueUpdated(_) => EVENT_ISSUE_UPDATED,
            Self::IssueDeleted { .. } => EVENT_ISSUE_DELETED,
            Self::ProgressChanged(_) => EVENT_PROGRESS_CHANGED,
        }
    }
}
