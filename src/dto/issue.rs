use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{IssueEntity, STATUS_OPEN},
    dto::format_system_time,
};

/// Script line reference as sent by clients, either a JSON number or a string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LineRefInput {
    Number(serde_json::Number),
    Text(String),
}

impl LineRefInput {
    /// Textual form checked by the creation validation.
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

/// Fields of a new issue. Sent as the `fields` part of the multipart upload.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateIssueRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub script_line_ref: Option<LineRefInput>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_blocking: bool,
    #[serde(default)]
    pub is_bug: bool,
    #[serde(default)]
    pub is_suggestion: bool,
    #[serde(default)]
    pub is_question: bool,
}

/// Issue projection served to members and carried by realtime events.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IssueSummary {
    pub id: Uuid,
    pub room_id: Uuid,
    pub creator_id: Uuid,
    pub script_line_ref: u32,
    pub description: String,
    pub is_blocking: bool,
    pub is_bug: bool,
    pub is_suggestion: bool,
    pub is_question: bool,
    /// `open` or one of the room's status tags.
    pub status: String,
    pub ticket_key: Option<String>,
    pub attachments: Vec<String>,
    pub created_at: String,
}

impl From<IssueEntity> for IssueSummary {
    fn from(value: IssueEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            creator_id: value.creator_id,
            script_line_ref: value.script_line_ref,
            description: value.description,
            is_blocking: value.flags.is_blocking,
            is_bug: value.flags.is_bug,
            is_suggestion: value.flags.is_suggestion,
            is_question: value.flags.is_question,
            status: value.status.unwrap_or_else(|| STATUS_OPEN.to_string()),
            ticket_key: value.ticket_key,
            attachments: value.attachments,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// New status for an issue. `null`, `""` and `"open"` reset it to `open`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

/// Ticket key attached to an issue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketLinkResponse {
    pub issue_id: Uuid,
    pub ticket_key: String,
}
