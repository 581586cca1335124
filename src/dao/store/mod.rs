#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use crate::dao::models::{
    CheckedProgressRow, IssueEntity, MembershipEntity, ProgressEntity, RoomEntity, ScriptEntity,
    ScriptLineEntity, UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for rooms, memberships, progress and issues.
///
/// Every method is a single request/response round-trip; implementations must make each
/// call atomic on its own (composite-key upserts included).
pub trait Store: Send + Sync {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;

    /// Persist a script together with its lines.
    fn insert_script(&self, script: ScriptEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_script(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScriptEntity>>>;
    fn find_script_line(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScriptLineEntity>>>;

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Insert or replace the membership row keyed by `(room_id, user_id)`.
    fn upsert_membership(
        &self,
        membership: MembershipEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_membership(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MembershipEntity>>>;
    fn list_user_memberships(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>>;

    /// Insert or replace the progress row keyed by `(user_id, line_id)`.
    fn upsert_progress(&self, progress: ProgressEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_progress(
        &self,
        user_id: Uuid,
        line_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProgressEntity>>>;
    /// Progress rows of one user restricted to the lines of `script_id`.
    fn list_user_progress(
        &self,
        user_id: Uuid,
        script_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ProgressEntity>>>;
    /// Checked progress rows on the lines of `script_id`, joined with their user.
    fn list_checked_progress(
        &self,
        script_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<CheckedProgressRow>>>;

    fn insert_issue(&self, issue: IssueEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_issue(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>>;
    /// Issues of a room ordered by script line reference, then creation time.
    fn list_issues(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<IssueEntity>>>;
    /// Replace the status of an issue, returning the updated row when it exists.
    fn update_issue_status(
        &self,
        id: Uuid,
        status: String,
    ) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>>;
    /// Store `ticket_key` only if the issue has none yet, returning the row as persisted.
    fn link_issue_ticket(
        &self,
        id: Uuid,
        ticket_key: String,
    ) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>>;
    /// Remove an issue, returning the deleted row when it existed.
    fn delete_issue(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>>;
}
