//! In-process store used for single-node deployments without CouchDB and by the test suite.

use std::{cmp::Ordering, sync::Arc};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use uuid::Uuid;

use crate::dao::{
    models::{
        CheckedProgressRow, IssueEntity, MembershipEntity, ProgressEntity, RoomEntity,
        ScriptEntity, ScriptLineEntity, UserEntity,
    },
    storage::StorageResult,
    store::Store,
};

#[derive(Default)]
struct Tables {
    users: DashMap<Uuid, UserEntity>,
    scripts: DashMap<Uuid, ScriptEntity>,
    lines: DashMap<Uuid, ScriptLineEntity>,
    rooms: DashMap<Uuid, RoomEntity>,
    memberships: DashMap<(Uuid, Uuid), MembershipEntity>,
    progress: DashMap<(Uuid, Uuid), ProgressEntity>,
    issues: DashMap<Uuid, IssueEntity>,
    #[cfg(test)]
    calls: DashMap<&'static str, usize>,
    #[cfg(test)]
    failing_tables: dashmap::DashSet<&'static str>,
}

/// Store keeping every table in concurrent hash maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, _operation: &'static str) {
        #[cfg(test)]
        {
            *self.tables.calls.entry(_operation).or_insert(0) += 1;
        }
    }

    /// Number of times `operation` was invoked since creation.
    #[cfg(test)]
    pub fn call_count(&self, operation: &str) -> usize {
        self.tables
            .calls
            .get(operation)
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Make subsequent inserts into `table` fail as if the backend went away.
    #[cfg(test)]
    pub fn fail_writes(&self, table: &'static str, fail: bool) {
        if fail {
            self.tables.failing_tables.insert(table);
        } else {
            self.tables.failing_tables.remove(&table);
        }
    }

    #[cfg(test)]
    fn check_write(&self, table: &'static str) -> StorageResult<()> {
        if self.tables.failing_tables.contains(&table) {
            return Err(crate::dao::storage::StorageError::unavailable(
                format!("{table} table offline"),
                std::io::Error::other("injected failure"),
            ));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_write(&self, _table: &'static str) -> StorageResult<()> {
        Ok(())
    }

    fn script_line_ids(&self, script_id: Uuid) -> Vec<Uuid> {
        self.tables
            .scripts
            .get(&script_id)
            .map(|script| script.lines.iter().map(|line| line.id).collect())
            .unwrap_or_default()
    }
}

fn issue_order(a: &IssueEntity, b: &IssueEntity) -> Ordering {
    a.script_line_ref
        .cmp(&b.script_line_ref)
        .then_with(|| a.created_at.cmp(&b.created_at))
}

impl Store for MemoryStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        async { Ok(()) }.boxed()
    }

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.track("upsert_user");
        self.tables.users.insert(user.id, user);
        async { Ok(()) }.boxed()
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        self.track("find_user");
        let user = self.tables.users.get(&id).map(|entry| entry.clone());
        async move { Ok(user) }.boxed()
    }

    fn insert_script(&self, script: ScriptEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.track("insert_script");
        for line in &script.lines {
            self.tables.lines.insert(line.id, line.clone());
        }
        self.tables.scripts.insert(script.id, script);
        async { Ok(()) }.boxed()
    }

    fn find_script(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScriptEntity>>> {
        self.track("find_script");
        let script = self.tables.scripts.get(&id).map(|entry| entry.clone());
        async move { Ok(script) }.boxed()
    }

    fn find_script_line(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScriptLineEntity>>> {
        self.track("find_script_line");
        let line = self.tables.lines.get(&id).map(|entry| entry.clone());
        async move { Ok(line) }.boxed()
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.track("insert_room");
        let result = self.check_write("rooms").map(|()| {
            self.tables.rooms.insert(room.id, room);
        });
        async move { result }.boxed()
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.track("find_room");
        let room = self.tables.rooms.get(&id).map(|entry| entry.clone());
        async move { Ok(room) }.boxed()
    }

    fn upsert_membership(
        &self,
        membership: MembershipEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.track("upsert_membership");
        self.tables
            .memberships
            .insert((membership.room_id, membership.user_id), membership);
        async { Ok(()) }.boxed()
    }

    fn find_membership(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<MembershipEntity>>> {
        self.track("find_membership");
        let membership = self
            .tables
            .memberships
            .get(&(room_id, user_id))
            .map(|entry| entry.clone());
        async move { Ok(membership) }.boxed()
    }

    fn list_user_memberships(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MembershipEntity>>> {
        self.track("list_user_memberships");
        let memberships = self
            .tables
            .memberships
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect::<Vec<_>>();
        async move { Ok(memberships) }.boxed()
    }

    fn upsert_progress(&self, progress: ProgressEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.track("upsert_progress");
        self.tables
            .progress
            .insert((progress.user_id, progress.line_id), progress);
        async { Ok(()) }.boxed()
    }

    fn find_progress(
        &self,
        user_id: Uuid,
        line_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ProgressEntity>>> {
        self.track("find_progress");
        let progress = self
            .tables
            .progress
            .get(&(user_id, line_id))
            .map(|entry| entry.clone());
        async move { Ok(progress) }.boxed()
    }

    fn list_user_progress(
        &self,
        user_id: Uuid,
        script_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ProgressEntity>>> {
        self.track("list_user_progress");
        let rows = self
            .script_line_ids(script_id)
            .into_iter()
            .filter_map(|line_id| {
                self.tables
                    .progress
                    .get(&(user_id, line_id))
                    .map(|entry| entry.clone())
            })
            .collect::<Vec<_>>();
        async move { Ok(rows) }.boxed()
    }

    fn list_checked_progress(
        &self,
        script_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<CheckedProgressRow>>> {
        self.track("list_checked_progress");
        let line_ids = self.script_line_ids(script_id);
        let checked = self
            .tables
            .progress
            .iter()
            .filter(|entry| entry.is_checked && line_ids.contains(&entry.line_id))
            .map(|entry| entry.user_id)
            .collect::<Vec<_>>();
        let rows = checked
            .into_iter()
            .map(|user_id| CheckedProgressRow {
                user: self.tables.users.get(&user_id).map(|entry| entry.clone()),
            })
            .collect::<Vec<_>>();
        async move { Ok(rows) }.boxed()
    }

    fn insert_issue(&self, issue: IssueEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.track("insert_issue");
        let result = self.check_write("issues").map(|()| {
            self.tables.issues.insert(issue.id, issue);
        });
        async move { result }.boxed()
    }

    fn find_issue(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        self.track("find_issue");
        let issue = self.tables.issues.get(&id).map(|entry| entry.clone());
        async move { Ok(issue) }.boxed()
    }

    fn list_issues(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<IssueEntity>>> {
        self.track("list_issues");
        let mut issues = self
            .tables
            .issues
            .iter()
            .filter(|entry| entry.room_id == room_id)
            .map(|entry| entry.clone())
            .collect::<Vec<_>>();
        issues.sort_by(issue_order);
        async move { Ok(issues) }.boxed()
    }

    fn update_issue_status(
        &self,
        id: Uuid,
        status: String,
    ) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        self.track("update_issue_status");
        let updated = self.tables.issues.get_mut(&id).map(|mut entry| {
            entry.status = Some(status);
            entry.clone()
        });
        async move { Ok(updated) }.boxed()
    }

    fn link_issue_ticket(
        &self,
        id: Uuid,
        ticket_key: String,
    ) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        self.track("link_issue_ticket");
        let linked = self.tables.issues.get_mut(&id).map(|mut entry| {
            if entry.ticket_key.is_none() {
                entry.ticket_key = Some(ticket_key);
            }
            entry.clone()
        });
        async move { Ok(linked) }.boxed()
    }

    fn delete_issue(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<IssueEntity>>> {
        self.track("delete_issue");
        let removed = self.tables.issues.remove(&id).map(|(_, issue)| issue);
        async move { Ok(removed) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::IssueFlags;

    fn issue(room_id: Uuid, line: u32, offset_secs: u64) -> IssueEntity {
        IssueEntity {
            id: Uuid::new_v4(),
            room_id,
            creator_id: Uuid::new_v4(),
            script_line_ref: line,
            description: format!("line {line}"),
            flags: IssueFlags::default(),
            status: Some("open".into()),
            ticket_key: None,
            attachments: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(offset_secs),
        }
    }

    #[tokio::test]
    async fn issues_are_listed_by_line_then_creation_time() {
        let store = MemoryStore::new();
        let room_id = Uuid::new_v4();
        let late_line_one = issue(room_id, 1, 50);
        let line_three = issue(room_id, 3, 10);
        let early_line_one = issue(room_id, 1, 20);
        for entry in [&late_line_one, &line_three, &early_line_one] {
            store.insert_issue(entry.clone()).await.unwrap();
        }
        store.insert_issue(issue(Uuid::new_v4(), 1, 0)).await.unwrap();

        let listed = store.list_issues(room_id).await.unwrap();
        let ids = listed.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![early_line_one.id, late_line_one.id, line_three.id]);
    }

    #[tokio::test]
    async fn ticket_key_is_never_overwritten() {
        let store = MemoryStore::new();
        let entry = issue(Uuid::new_v4(), 1, 0);
        store.insert_issue(entry.clone()).await.unwrap();

        let first = store
            .link_issue_ticket(entry.id, "QA-1".into())
            .await
            .unwrap()
            .unwrap();
        let second = store
            .link_issue_ticket(entry.id, "QA-2".into())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.ticket_key.as_deref(), Some("QA-1"));
        assert_eq!(second.ticket_key.as_deref(), Some("QA-1"));
    }

    #[tokio::test]
    async fn membership_upsert_keeps_a_single_row() {
        let store = MemoryStore::new();
        let (room_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
        for is_groupier in [false, true] {
            store
                .upsert_membership(MembershipEntity {
                    room_id,
                    user_id,
                    is_groupier,
                })
                .await
                .unwrap();
        }

        let rows = store.list_user_memberships(user_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_groupier);
    }
}
