use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Status every issue starts in, and the state a cleared status returns to.
pub const STATUS_OPEN: &str = "open";

/// Profile of a user as last forwarded by the identity proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier issued by the SSO provider.
    pub id: Uuid,
    /// Human readable name, when the provider shares one.
    pub display_name: Option<String>,
    /// Contact address, used for groupier promotion and as a sort fallback.
    pub email: Option<String>,
}

/// Named, ordered list of steps attached to a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptEntity {
    /// Primary key of the script.
    pub id: Uuid,
    /// Display name of the script.
    pub name: String,
    /// Lines ordered by `line_number`.
    pub lines: Vec<ScriptLineEntity>,
}

/// One step of a test script. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptLineEntity {
    /// Primary key of the line.
    pub id: Uuid,
    /// Script owning the line.
    pub script_id: Uuid,
    /// Ordinal position, unique within the script.
    pub line_number: u32,
    /// Short title of the step.
    pub name: String,
    /// Instructions for the step.
    pub description: String,
    /// Free-text notes shipped with the step.
    pub notes: String,
}

/// Collaboration space holding one script and its issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Display name of the room.
    pub name: String,
    /// User who created the room; always a groupier.
    pub creator_id: Uuid,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Script attached at creation time. Never absent.
    pub script_id: Uuid,
    /// Status tags issues of this room may take besides `open`.
    pub status_tags: Vec<String>,
}

/// Proof that a user may read and write within a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipEntity {
    pub room_id: Uuid,
    pub user_id: Uuid,
    /// Elevated role allowed to change statuses and delete any issue.
    pub is_groupier: bool,
}

/// Checked state of one script line for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEntity {
    pub user_id: Uuid,
    pub line_id: Uuid,
    pub is_checked: bool,
    /// Set when the line was last checked, cleared on uncheck.
    pub checked_at: Option<SystemTime>,
    pub notes: Option<String>,
}

/// Checked progress row joined with the owning user's profile.
///
/// `user` is `None` when the profile no longer exists (anonymized or deleted accounts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedProgressRow {
    pub user: Option<UserEntity>,
}

/// Independent classification flags carried by an issue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueFlags {
    pub is_blocking: bool,
    pub is_bug: bool,
    pub is_suggestion: bool,
    pub is_question: bool,
}

/// User-filed report against a script line reference within a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueEntity {
    /// Primary key of the issue.
    pub id: Uuid,
    /// Room the issue belongs to.
    pub room_id: Uuid,
    /// User who filed the issue.
    pub creator_id: Uuid,
    /// Script line number the issue refers to. Not checked against existing lines.
    pub script_line_ref: u32,
    pub description: String,
    #[serde(flatten)]
    pub flags: IssueFlags,
    /// `open` or one of the room's status tags.
    pub status: Option<String>,
    /// External ticket key. Permanent once set.
    pub ticket_key: Option<String>,
    /// References returned by the attachment store.
    pub attachments: Vec<String>,
    pub created_at: SystemTime,
}
