use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Arc,
    time::SystemTime,
};

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    cache::{Cache, CacheExt, room_leaderboard_key},
    config::AppConfig,
    dao::{
        models::{
            CheckedProgressRow, MembershipEntity, ProgressEntity, RoomEntity, STATUS_OPEN,
            ScriptEntity, ScriptLineEntity, UserEntity,
        },
        store::Store,
    },
    dto::{
        events::RoomEvent,
        room::{
            CreateRoomRequest, LeaderboardEntry, MembershipSummary, ProgressSummary,
            RoomSummary, ScriptLineSummary, ToggleProgressRequest,
        },
    },
    error::ServiceError,
    services::access::{AccessGuard, Identity},
    state::hub::Broadcaster,
};

/// Sort label of the leaderboard bucket holding progress of vanished users.
const ANONYMOUS_LABEL: &str = "anonymous";

/// Room creation, membership and script progress.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    broadcaster: Arc<dyn Broadcaster>,
    guard: AccessGuard,
    config: Arc<AppConfig>,
}

impl RoomService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        broadcaster: Arc<dyn Broadcaster>,
        guard: AccessGuard,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            broadcaster,
            guard,
            config,
        }
    }

    /// Open a room owned by `identity`, cloning the template script when one is given.
    ///
    /// The creator is recorded as a groupier of the new room.
    pub async fn create_room(
        &self,
        identity: &Identity,
        request: CreateRoomRequest,
    ) -> Result<RoomSummary, ServiceError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("room name is required".into()));
        }

        let script = match request.template_script_id {
            Some(template_id) => {
                let template = self.store.find_script(template_id).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("template script `{template_id}` not found"))
                })?;
                clone_script(&template)
            }
            None => ScriptEntity {
                id: Uuid::new_v4(),
                name: name.clone(),
                lines: Vec::new(),
            },
        };

        let status_tags = match request.status_tags {
            Some(tags) => normalize_tags(tags),
            None => self.config.status_tags().to_vec(),
        };

        let room = RoomEntity {
            id: Uuid::new_v4(),
            name,
            creator_id: identity.user_id,
            created_at: SystemTime::now(),
            script_id: script.id,
            status_tags,
        };

        self.record_profile(identity).await?;
        self.store.insert_script(script).await?;
        // The groupier row lands first so a stored room always has one. A membership left
        // behind by a failed room insert names a room id that was never handed out.
        self.store
            .upsert_membership(MembershipEntity {
                room_id: room.id,
                user_id: identity.user_id,
                is_groupier: true,
            })
            .await?;
        if let Err(err) = self.store.insert_room(room.clone()).await {
            error!(
                room = %room.id,
                creator = %identity.user_id,
                error = %err,
                "room insert failed after its groupier membership was stored"
            );
            return Err(err.into());
        }

        info!(
            room = %room.id,
            creator = %identity.user_id,
            template = ?request.template_script_id,
            "room created"
        );
        Ok(RoomSummary::new(room, true))
    }

    /// Rooms `identity` belongs to, newest first.
    pub async fn list_rooms(&self, identity: &Identity) -> Result<Vec<RoomSummary>, ServiceError> {
        let memberships = self.store.list_user_memberships(identity.user_id).await?;
        let mut rooms = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(room) = self.store.find_room(membership.room_id).await? {
                rooms.push(RoomSummary::new(room, membership.is_groupier));
            }
        }
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    /// Add `identity` to a room, or refresh an existing membership.
    ///
    /// The creator and configured groupier emails join as groupiers. An existing groupier
    /// role is never revoked by joining again.
    pub async fn join_room(
        &self,
        identity: &Identity,
        room_id: Uuid,
    ) -> Result<MembershipSummary, ServiceError> {
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))?;

        let existing = self.store.find_membership(room_id, identity.user_id).await?;
        let listed = identity
            .email
            .as_deref()
            .is_some_and(|email| self.config.is_groupier_email(email));
        let membership = MembershipEntity {
            room_id,
            user_id: identity.user_id,
            is_groupier: existing.is_some_and(|m| m.is_groupier)
                || room.creator_id == identity.user_id
                || listed,
        };

        self.record_profile(identity).await?;
        self.store.upsert_membership(membership.clone()).await?;

        info!(
            room = %room_id,
            user = %identity.user_id,
            groupier = membership.is_groupier,
            "user joined room"
        );
        Ok(membership.into())
    }

    /// Grant the groupier role to an existing member. Groupiers only.
    pub async fn promote_member(
        &self,
        identity: &Identity,
        room_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<MembershipSummary, ServiceError> {
        self.guard
            .require_groupier(room_id, identity.user_id)
            .await?;

        let mut membership = self
            .store
            .find_membership(room_id, target_user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "user `{target_user_id}` is not a member of room `{room_id}`"
                ))
            })?;

        if !membership.is_groupier {
            membership.is_groupier = true;
            self.store.upsert_membership(membership.clone()).await?;
            info!(room = %room_id, user = %target_user_id, by = %identity.user_id, "member promoted");
        }
        Ok(membership.into())
    }

    /// Script lines of the room merged with the caller's progress.
    pub async fn list_lines(
        &self,
        identity: &Identity,
        room_id: Uuid,
    ) -> Result<Vec<ScriptLineSummary>, ServiceError> {
        self.guard.require_member(room_id, identity.user_id).await?;
        let room = self.load_room(room_id).await?;
        let script = self
            .store
            .find_script(room.script_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("script `{}` not found", room.script_id))
            })?;
        let progress: HashMap<Uuid, ProgressEntity> = self
            .store
            .list_user_progress(identity.user_id, room.script_id)
            .await?
            .into_iter()
            .map(|row| (row.line_id, row))
            .collect();

        let mut lines = script.lines;
        lines.sort_by_key(|line| line.line_number);
        Ok(lines
            .into_iter()
            .map(|line| {
                let row = progress.get(&line.id);
                ScriptLineSummary::new(line, row)
            })
            .collect())
    }

    /// Check, uncheck or annotate a script line for the caller.
    pub async fn toggle_progress(
        &self,
        identity: &Identity,
        room_id: Uuid,
        line_id: Uuid,
        request: ToggleProgressRequest,
        origin: Option<Uuid>,
    ) -> Result<ProgressSummary, ServiceError> {
        self.guard.require_member(room_id, identity.user_id).await?;
        let room = self.load_room(room_id).await?;
        let line = self
            .store
            .find_script_line(line_id)
            .await?
            .filter(|line| line.script_id == room.script_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("line `{line_id}` not found in room `{room_id}`"))
            })?;

        let existing = self.store.find_progress(identity.user_id, line.id).await?;
        let was_checked = existing.as_ref().is_some_and(|row| row.is_checked);
        let is_checked = request.is_checked.unwrap_or(!was_checked);
        let checked_at = match (is_checked, &existing) {
            (false, _) => None,
            (true, Some(row)) if row.is_checked => row.checked_at,
            (true, _) => Some(SystemTime::now()),
        };
        let notes = match request.notes {
            Some(notes) if notes.trim().is_empty() => None,
            Some(notes) => Some(notes),
            None => existing.and_then(|row| row.notes),
        };

        let progress = ProgressEntity {
            user_id: identity.user_id,
            line_id: line.id,
            is_checked,
            checked_at,
            notes,
        };
        self.store.upsert_progress(progress.clone()).await?;

        self.cache.invalidate(&[room_leaderboard_key(room_id)]).await;
        let summary = ProgressSummary::from(progress);
        self.broadcaster.publish(
            room_id,
            RoomEvent::ProgressChanged(summary.clone()),
            origin,
        );

        debug!(room = %room_id, line = %line_id, user = %identity.user_id, is_checked, "progress toggled");
        Ok(summary)
    }

    /// Ranking of members by checked lines, served through the cache.
    pub async fn leaderboard(
        &self,
        identity: &Identity,
        room_id: Uuid,
    ) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        self.guard.require_member(room_id, identity.user_id).await?;
        let room = self.load_room(room_id).await?;
        let store = self.store.clone();
        let script_id = room.script_id;

        self.cache
            .wrap(
                &room_leaderboard_key(room_id),
                self.config.cache().room_ttl,
                move || async move {
                    let rows = store.list_checked_progress(script_id).await?;
                    Ok::<_, ServiceError>(aggregate_leaderboard(rows))
                },
            )
            .await
    }

    /// Save the caller's profile, keeping stored fields the proxy did not forward this time.
    async fn record_profile(&self, identity: &Identity) -> Result<(), ServiceError> {
        let stored = self.store.find_user(identity.user_id).await?;
        let mut user = identity.to_user();
        if let Some(stored) = &stored {
            user.display_name = user.display_name.or_else(|| stored.display_name.clone());
            user.email = user.email.or_else(|| stored.email.clone());
        }
        if stored.as_ref() != Some(&user) {
            self.store.upsert_user(user).await?;
        }
        Ok(())
    }

    async fn load_room(&self, room_id: Uuid) -> Result<RoomEntity, ServiceError> {
        self.store
            .find_room(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
    }
}

/// Copy a template script under fresh identifiers.
fn clone_script(template: &ScriptEntity) -> ScriptEntity {
    let script_id = Uuid::new_v4();
    ScriptEntity {
        id: script_id,
        name: template.name.clone(),
        lines: template
            .lines
            .iter()
            .map(|line| ScriptLineEntity {
                id: Uuid::new_v4(),
                script_id,
                ..line.clone()
            })
            .collect(),
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || tag == STATUS_OPEN || normalized.iter().any(|t| t == tag) {
            continue;
        }
        normalized.push(tag.to_string());
    }
    normalized
}

fn sort_label(user: Option<&UserEntity>) -> String {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
    };
    user.and_then(|user| non_blank(&user.display_name).or_else(|| non_blank(&user.email)))
        .unwrap_or_else(|| ANONYMOUS_LABEL.to_string())
}

/// Group checked rows per user and rank them.
///
/// Rows without a user collapse into a single anonymous entry. Ties on the count are
/// broken by the lowercase display name, the email, then the anonymous label.
pub fn aggregate_leaderboard(rows: Vec<CheckedProgressRow>) -> Vec<LeaderboardEntry> {
    let mut buckets: HashMap<Option<Uuid>, (Option<UserEntity>, u32)> = HashMap::new();
    for row in rows {
        let key = row.user.as_ref().map(|user| user.id);
        let bucket = buckets.entry(key).or_insert_with(|| (row.user.clone(), 0));
        bucket.1 += 1;
    }

    let mut ranked: Vec<(String, Option<UserEntity>, u32)> = buckets
        .into_values()
        .map(|(user, checked)| (sort_label(user.as_ref()), user, checked))
        .collect();
    ranked.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| match (&a.1, &b.1) {
                (Some(x), Some(y)) => x.id.cmp(&y.id),
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (None, None) => Ordering::Equal,
            })
    });

    ranked
        .into_iter()
        .map(|(_, user, checked)| match user {
            Some(user) => LeaderboardEntry {
                user_id: Some(user.id),
                display_name: user.display_name,
                email: user.email,
                checked,
            },
            None => LeaderboardEntry {
                user_id: None,
                display_name: None,
                email: None,
                checked,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::room_issues_key,
        config::AppConfig,
        services::test_support::{CacheOp, Harness},
    };

    fn user(name: &str) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            display_name: Some(name.into()),
            email: None,
        }
    }

    fn create_request(name: &str) -> CreateRoomRequest {
        CreateRoomRequest {
            name: name.into(),
            template_script_id: None,
            status_tags: None,
        }
    }

    async fn template(harness: &Harness, lines: u32) -> ScriptEntity {
        let script_id = Uuid::new_v4();
        let script = ScriptEntity {
            id: script_id,
            name: "Checkout".into(),
            lines: (1..=lines)
                .map(|n| ScriptLineEntity {
                    id: Uuid::new_v4(),
                    script_id,
                    line_number: n,
                    name: format!("step {n}"),
                    description: "do it".into(),
                    notes: String::new(),
                })
                .collect(),
        };
        harness.store.insert_script(script.clone()).await.unwrap();
        script
    }

    #[test]
    fn leaderboard_ranks_by_count_then_label() {
        let alice = user("Alice");
        let bob = user("Bob");
        let rows = vec![
            CheckedProgressRow {
                user: Some(bob.clone()),
            },
            CheckedProgressRow { user: None },
            CheckedProgressRow {
                user: Some(alice.clone()),
            },
            CheckedProgressRow {
                user: Some(alice.clone()),
            },
        ];

        let board = aggregate_leaderboard(rows);

        let order: Vec<(Option<Uuid>, u32)> =
            board.iter().map(|entry| (entry.user_id, entry.checked)).collect();
        assert_eq!(
            order,
            vec![(Some(alice.id), 2), (None, 1), (Some(bob.id), 1)]
        );
    }

    #[test]
    fn leaderboard_falls_back_to_email_case_insensitively() {
        let zed = UserEntity {
            id: Uuid::new_v4(),
            display_name: None,
            email: Some("Zed@example.com".into()),
        };
        let amy = UserEntity {
            id: Uuid::new_v4(),
            display_name: Some("  ".into()),
            email: Some("amy@example.com".into()),
        };
        let board = aggregate_leaderboard(vec![
            CheckedProgressRow { user: Some(zed.clone()) },
            CheckedProgressRow { user: Some(amy.clone()) },
        ]);
        assert_eq!(board[0].user_id, Some(amy.id));
        assert_eq!(board[1].user_id, Some(zed.id));
    }

    #[tokio::test]
    async fn creator_is_groupier_and_joiners_follow_the_email_list() {
        let harness = Harness::new();
        let creator = Identity::new(Uuid::new_v4()).with_email("owner@example.com");
        let room = harness
            .rooms
            .create_room(&creator, create_request("Sprint Test"))
            .await
            .unwrap();
        assert!(room.is_groupier);
        assert_eq!(room.status_tags, ["fixed", "wont_fix"]);

        let tester = Identity::new(Uuid::new_v4()).with_email("tester@example.com");
        let joined = harness.rooms.join_room(&tester, room.id).await.unwrap();
        assert!(!joined.is_groupier);

        let lead = Identity::new(Uuid::new_v4()).with_email("Lead@Example.com");
        let joined = harness.rooms.join_room(&lead, room.id).await.unwrap();
        assert!(joined.is_groupier);

        let rejoined = harness.rooms.join_room(&creator, room.id).await.unwrap();
        assert!(rejoined.is_groupier);
    }

    #[tokio::test]
    async fn joining_never_demotes_a_promoted_member() {
        let harness = Harness::with_config(AppConfig::with_rules(vec![], vec![]));
        let creator = Identity::new(Uuid::new_v4());
        let room = harness
            .rooms
            .create_room(&creator, create_request("Regression"))
            .await
            .unwrap();
        let member = Identity::new(Uuid::new_v4());
        harness.rooms.join_room(&member, room.id).await.unwrap();

        let promoted = harness
            .rooms
            .promote_member(&creator, room.id, member.user_id)
            .await
            .unwrap();
        assert!(promoted.is_groupier);

        let again = harness.rooms.join_room(&member, room.id).await.unwrap();
        assert!(again.is_groupier);
    }

    #[tokio::test]
    async fn only_groupiers_promote_and_only_members_are_promoted() {
        let harness = Harness::new();
        let creator = Identity::new(Uuid::new_v4());
        let room = harness
            .rooms
            .create_room(&creator, create_request("Roles"))
            .await
            .unwrap();
        let member = Identity::new(Uuid::new_v4());
        harness.rooms.join_room(&member, room.id).await.unwrap();

        assert!(matches!(
            harness
                .rooms
                .promote_member(&member, room.id, member.user_id)
                .await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            harness
                .rooms
                .promote_member(&creator, room.id, Uuid::new_v4())
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn joining_an_unknown_room_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .rooms
            .join_room(&Identity::new(Uuid::new_v4()), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn template_scripts_are_cloned_under_new_ids() {
        let harness = Harness::new();
        let template = template(&harness, 3).await;
        let creator = Identity::new(Uuid::new_v4());
        let room = harness
            .rooms
            .create_room(
                &creator,
                CreateRoomRequest {
                    name: "Cloned".into(),
                    template_script_id: Some(template.id),
                    status_tags: Some(vec!["blocked".into(), "open".into(), "blocked".into()]),
                },
            )
            .await
            .unwrap();
        assert_ne!(room.script_id, template.id);
        assert_eq!(room.status_tags, ["blocked"]);

        let lines = harness.rooms.list_lines(&creator, room.id).await.unwrap();
        assert_eq!(
            lines.iter().map(|line| line.line_number).collect::<Vec<_>>(),
            [1, 2, 3]
        );
        assert!(lines.iter().all(|line| !line.is_checked));
        assert!(
            lines
                .iter()
                .all(|line| template.lines.iter().all(|t| t.id != line.id))
        );
    }

    #[tokio::test]
    async fn missing_template_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .rooms
            .create_room(
                &Identity::new(Uuid::new_v4()),
                CreateRoomRequest {
                    name: "Nope".into(),
                    template_script_id: Some(Uuid::new_v4()),
                    status_tags: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn toggling_progress_invalidates_leaderboard_then_publishes() {
        let harness = Harness::new();
        let template = template(&harness, 2).await;
        let creator = Identity::new(Uuid::new_v4()).with_display_name("Alice");
        let room = harness
            .rooms
            .create_room(
                &creator,
                CreateRoomRequest {
                    name: "Progress".into(),
                    template_script_id: Some(template.id),
                    status_tags: None,
                },
            )
            .await
            .unwrap();
        let line_id = harness.rooms.list_lines(&creator, room.id).await.unwrap()[0].id;

        let empty = harness.rooms.leaderboard(&creator, room.id).await.unwrap();
        assert!(empty.is_empty());
        harness.cache.clear_log();

        let progress = harness
            .rooms
            .toggle_progress(&creator, room.id, line_id, ToggleProgressRequest::default(), None)
            .await
            .unwrap();
        assert!(progress.is_checked);
        assert!(progress.checked_at.is_some());
        assert_eq!(
            harness.cache.ops(),
            vec![CacheOp::Delete(room_leaderboard_key(room.id))]
        );
        assert!(!harness.cache.deleted().contains(&room_issues_key(room.id)));

        harness.timeline.assert_invalidated_before_publish(
            &[room_leaderboard_key(room.id)],
            "progress.changed",
        );
        let events = harness.broadcaster.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0].1, RoomEvent::ProgressChanged(p) if p.line_id == line_id));

        let board = harness.rooms.leaderboard(&creator, room.id).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].checked, 1);

        let unchecked = harness
            .rooms
            .toggle_progress(&creator, room.id, line_id, ToggleProgressRequest::default(), None)
            .await
            .unwrap();
        assert!(!unchecked.is_checked);
        assert!(unchecked.checked_at.is_none());
        assert_eq!(harness.store.call_count("upsert_progress"), 2);
    }

    #[tokio::test]
    async fn lines_of_other_scripts_are_not_found() {
        let harness = Harness::new();
        let foreign = template(&harness, 1).await;
        let creator = Identity::new(Uuid::new_v4());
        let room = harness
            .rooms
            .create_room(&creator, create_request("Empty"))
            .await
            .unwrap();

        let err = harness
            .rooms
            .toggle_progress(
                &creator,
                room.id,
                foreign.lines[0].id,
                ToggleProgressRequest::default(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(harness.broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn rejoining_without_profile_headers_keeps_the_stored_profile() {
        let harness = Harness::new();
        let creator = Identity::new(Uuid::new_v4());
        let room = harness
            .rooms
            .create_room(&creator, create_request("Profiles"))
            .await
            .unwrap();
        let user_id = Uuid::new_v4();
        let named = Identity::new(user_id)
            .with_display_name("Alice")
            .with_email("alice@example.com");
        harness.rooms.join_room(&named, room.id).await.unwrap();

        harness
            .rooms
            .join_room(&Identity::new(user_id), room.id)
            .await
            .unwrap();
        let stored = harness.store.find_user(user_id).await.unwrap().unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Alice"));
        assert_eq!(stored.email.as_deref(), Some("alice@example.com"));

        harness
            .rooms
            .join_room(&Identity::new(user_id).with_display_name("Alice B."), room.id)
            .await
            .unwrap();
        let stored = harness.store.find_user(user_id).await.unwrap().unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Alice B."));
        assert_eq!(stored.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn failed_room_insert_leaves_no_visible_room() {
        let harness = Harness::new();
        let creator = Identity::new(Uuid::new_v4());
        harness.store.fail_writes("rooms", true);

        let err = harness
            .rooms
            .create_room(&creator, create_request("Doomed"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
        assert!(harness.rooms.list_rooms(&creator).await.unwrap().is_empty());

        harness.store.fail_writes("rooms", false);
        let room = harness
            .rooms
            .create_room(&creator, create_request("Retried"))
            .await
            .unwrap();
        let membership = harness
            .store
            .find_membership(room.id, creator.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(membership.is_groupier);
        assert_eq!(harness.rooms.list_rooms(&creator).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn strangers_never_reach_the_leaderboard_computation() {
        let harness = Harness::new();
        let creator = Identity::new(Uuid::new_v4());
        let room = harness
            .rooms
            .create_room(&creator, create_request("Private"))
            .await
            .unwrap();

        let stranger = Identity::new(Uuid::new_v4());
        let err = harness.rooms.leaderboard(&stranger, room.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(harness.store.call_count("list_checked_progress"), 0);
        assert!(harness.cache.ops().is_empty());

        assert!(matches!(
            harness.rooms.list_lines(&stranger, room.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
