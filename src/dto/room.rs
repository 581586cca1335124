use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MembershipEntity, ProgressEntity, RoomEntity, ScriptLineEntity},
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_status_tags},
    },
};

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 120), custom(function = "validate_not_blank"))]
    pub name: String,
    /// Script whose lines are copied into the new room. An empty script is created when omitted.
    #[serde(default)]
    pub template_script_id: Option<Uuid>,
    /// Status tags for this room. The configured defaults apply when omitted.
    #[serde(default)]
    #[validate(custom(function = "validate_status_tags"))]
    pub status_tags: Option<Vec<String>>,
}

/// Room as seen by one of its members.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
    pub created_at: String,
    pub script_id: Uuid,
    pub status_tags: Vec<String>,
    /// Whether the caller holds the groupier role in this room.
    pub is_groupier: bool,
}

impl RoomSummary {
    pub fn new(room: RoomEntity, is_groupier: bool) -> Self {
        Self {
            id: room.id,
            name: room.name,
            creator_id: room.creator_id,
            created_at: format_system_time(room.created_at),
            script_id: room.script_id,
            status_tags: room.status_tags,
            is_groupier,
        }
    }
}

/// Membership row returned after joining or promotion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MembershipSummary {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub is_groupier: bool,
}

impl From<MembershipEntity> for MembershipSummary {
    fn from(value: MembershipEntity) -> Self {
        Self {
            room_id: value.room_id,
            user_id: value.user_id,
            is_groupier: value.is_groupier,
        }
    }
}

/// Script line merged with the caller's own progress on it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScriptLineSummary {
    pub id: Uuid,
    pub line_number: u32,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub is_checked: bool,
    pub checked_at: Option<String>,
    pub progress_notes: Option<String>,
}

impl ScriptLineSummary {
    pub fn new(line: ScriptLineEntity, progress: Option<&ProgressEntity>) -> Self {
        Self {
            id: line.id,
            line_number: line.line_number,
            name: line.name,
            description: line.description,
            notes: line.notes,
            is_checked: progress.is_some_and(|p| p.is_checked),
            checked_at: progress.and_then(|p| p.checked_at).map(format_system_time),
            progress_notes: progress.and_then(|p| p.notes.clone()),
        }
    }
}

/// Check or uncheck a script line.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct ToggleProgressRequest {
    /// Target state; flips the current state when omitted.
    #[serde(default)]
    pub is_checked: Option<bool>,
    /// Replaces the stored notes when present.
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Progress row broadcast to the room and returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProgressSummary {
    pub user_id: Uuid,
    pub line_id: Uuid,
    pub is_checked: bool,
    pub checked_at: Option<String>,
    pub notes: Option<String>,
}

impl From<ProgressEntity> for ProgressSummary {
    fn from(value: ProgressEntity) -> Self {
        Self {
            user_id: value.user_id,
            line_id: value.line_id,
            is_checked: value.is_checked,
            checked_at: value.checked_at.map(format_system_time),
            notes: value.notes,
        }
    }
}

/// One leaderboard position. Identity fields are empty for the anonymous bucket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: Option<Uuid>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Number of checked script lines.
    pub checked: u32,
}
