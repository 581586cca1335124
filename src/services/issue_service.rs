use std::{sync::Arc, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    cache::{Cache, CacheExt, room_issues_key, room_leaderboard_key},
    config::{AppConfig, TICKET_SUMMARY_MAX_CHARS},
    dao::{
        models::{IssueEntity, IssueFlags, RoomEntity, STATUS_OPEN},
        store::Store,
    },
    dto::{
        events::RoomEvent,
        issue::{CreateIssueRequest, IssueSummary, TicketLinkResponse, UpdateStatusRequest},
        validation::parse_line_ref,
    },
    error::ServiceError,
    services::{
        access::{AccessGuard, Identity},
        attachments::{AttachmentStore, UploadedFile, display_name},
        ticket::{
            TicketAttachment, TicketBridge, TicketError, TicketRequest, TicketSection,
            truncate_summary,
        },
    },
    state::hub::Broadcaster,
};

/// Issue lifecycle: filing, triage, ticket mirroring and removal.
#[derive(Clone)]
pub struct IssueService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    broadcaster: Arc<dyn Broadcaster>,
    bridge: Arc<dyn TicketBridge>,
    attachments: Arc<dyn AttachmentStore>,
    guard: AccessGuard,
    config: Arc<AppConfig>,
}

impl IssueService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        broadcaster: Arc<dyn Broadcaster>,
        bridge: Arc<dyn TicketBridge>,
        attachments: Arc<dyn AttachmentStore>,
        guard: AccessGuard,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            broadcaster,
            bridge,
            attachments,
            guard,
            config,
        }
    }

    /// Issues of a room ordered by line reference then creation time, served through the cache.
    pub async fn list_issues(
        &self,
        identity: &Identity,
        room_id: Uuid,
    ) -> Result<Vec<IssueSummary>, ServiceError> {
        self.guard.require_member(room_id, identity.user_id).await?;
        let store = self.store.clone();

        self.cache
            .wrap(
                &room_issues_key(room_id),
                self.config.cache().room_ttl,
                move || async move {
                    let issues = store.list_issues(room_id).await?;
                    Ok::<_, ServiceError>(issues.into_iter().map(IssueSummary::from).collect())
                },
            )
            .await
    }

    /// File an issue in a room, committing its attachments first.
    ///
    /// Attachments already committed are removed again when the issue cannot be persisted.
    pub async fn create_issue(
        &self,
        identity: &Identity,
        room_id: Uuid,
        request: CreateIssueRequest,
        files: Vec<UploadedFile>,
        origin: Option<Uuid>,
    ) -> Result<IssueSummary, ServiceError> {
        self.guard.require_member(room_id, identity.user_id).await?;

        let script_line_ref = request
            .script_line_ref
            .as_ref()
            .and_then(|value| parse_line_ref(&value.as_text()))
            .ok_or_else(|| {
                ServiceError::InvalidInput("script_line_ref must be a non-negative integer".into())
            })?;
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput("description is required".into()))?
            .to_string();

        let attachments = self.commit_attachments(files).await?;
        let issue = IssueEntity {
            id: Uuid::new_v4(),
            room_id,
            creator_id: identity.user_id,
            script_line_ref,
            description,
            flags: IssueFlags {
                is_blocking: request.is_blocking,
                is_bug: request.is_bug,
                is_suggestion: request.is_suggestion,
                is_question: request.is_question,
            },
            status: Some(STATUS_OPEN.to_string()),
            ticket_key: None,
            attachments,
            created_at: SystemTime::now(),
        };

        if let Err(err) = self.store.insert_issue(issue.clone()).await {
            self.discard_attachments(&issue.attachments).await;
            return Err(err.into());
        }

        self.invalidate_room(room_id).await;
        let summary = IssueSummary::from(issue);
        self.broadcaster
            .publish(room_id, RoomEvent::IssueCreated(summary.clone()), origin);

        info!(
            issue = %summary.id,
            room = %room_id,
            creator = %identity.user_id,
            attachments = summary.attachments.len(),
            "issue created"
        );
        Ok(summary)
    }

    /// Move an issue to one of its room's status tags, or back to `open`. Groupiers only.
    pub async fn update_status(
        &self,
        identity: &Identity,
        issue_id: Uuid,
        request: UpdateStatusRequest,
        origin: Option<Uuid>,
    ) -> Result<IssueSummary, ServiceError> {
        let issue = self.load_issue(issue_id).await?;
        self.guard
            .require_groupier(issue.room_id, identity.user_id)
            .await?;
        let room = self.load_room(issue.room_id).await?;
        let status = resolve_status(request.status.as_deref(), &room.status_tags)?;

        let updated = self
            .store
            .update_issue_status(issue_id, status)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("issue `{issue_id}` not found")))?;

        self.invalidate_room(updated.room_id).await;
        let summary = IssueSummary::from(updated);
        self.broadcaster.publish(
            summary.room_id,
            RoomEvent::IssueUpdated(summary.clone()),
            origin,
        );

        info!(issue = %issue_id, status = %summary.status, by = %identity.user_id, "issue status updated");
        Ok(summary)
    }

    /// Mirror an issue as an external ticket. Repeated calls return the first key.
    ///
    /// No key is stored unless the tracker confirms one. Attachments are forwarded after
    /// linking; their failures are logged only.
    pub async fn link_ticket(
        &self,
        identity: &Identity,
        issue_id: Uuid,
        origin: Option<Uuid>,
    ) -> Result<TicketLinkResponse, ServiceError> {
        let issue = self
            .guard
            .require_creator_or_groupier(issue_id, identity.user_id)
            .await?;
        if let Some(ticket_key) = issue.ticket_key {
            return Ok(TicketLinkResponse {
                issue_id,
                ticket_key,
            });
        }

        let room = self.load_room(issue.room_id).await?;
        let request = self.ticket_request(&room, &issue);
        let tickets = self.config.tickets();
        let filed = tokio::time::timeout(tickets.timeout, self.bridge.file_ticket(request))
            .await
            .map_err(|_| {
                TicketError::Unavailable(format!(
                    "no answer within {}s",
                    tickets.timeout.as_secs()
                ))
            })?;
        let ticket_key = match filed {
            Ok(key) => key,
            Err(err) => {
                warn!(issue = %issue_id, error = %err, "ticket tracker refused issue");
                return Err(err.into());
            }
        };

        let linked = self
            .store
            .link_issue_ticket(issue_id, ticket_key.clone())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("issue `{issue_id}` not found")))?;
        let stored_key = linked.ticket_key.clone().unwrap_or_else(|| ticket_key.clone());

        if stored_key == ticket_key {
            self.forward_attachments(&ticket_key, &linked.attachments).await;
        } else {
            warn!(
                issue = %issue_id,
                filed = %ticket_key,
                kept = %stored_key,
                "issue was linked concurrently; keeping the first ticket"
            );
        }

        self.invalidate_room(linked.room_id).await;
        let summary = IssueSummary::from(linked);
        self.broadcaster
            .publish(summary.room_id, RoomEvent::IssueUpdated(summary), origin);

        info!(issue = %issue_id, ticket = %stored_key, "issue linked to ticket");
        Ok(TicketLinkResponse {
            issue_id,
            ticket_key: stored_key,
        })
    }

    /// Remove an issue. Its attachments are deleted in the background afterwards.
    pub async fn delete_issue(
        &self,
        identity: &Identity,
        issue_id: Uuid,
        origin: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        self.guard
            .require_creator_or_groupier(issue_id, identity.user_id)
            .await?;
        let deleted = self
            .store
            .delete_issue(issue_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("issue `{issue_id}` not found")))?;

        self.invalidate_room(deleted.room_id).await;
        self.broadcaster.publish(
            deleted.room_id,
            RoomEvent::IssueDeleted { id: issue_id },
            origin,
        );
        info!(issue = %issue_id, by = %identity.user_id, "issue deleted");

        if !deleted.attachments.is_empty() {
            let service = self.clone();
            tokio::spawn(async move {
                service.discard_attachments(&deleted.attachments).await;
            });
        }
        Ok(())
    }

    async fn load_issue(&self, issue_id: Uuid) -> Result<IssueEntity, ServiceError> {
        self.store
            .find_issue(issue_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("issue `{issue_id}` not found")))
    }

    async fn load_room(&self, room_id: Uuid) -> Result<RoomEntity, ServiceError> {
        self.store
            .find_room(room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
    }

    async fn invalidate_room(&self, room_id: Uuid) {
        self.cache
            .invalidate(&[room_issues_key(room_id), room_leaderboard_key(room_id)])
            .await;
    }

    async fn commit_attachments(&self, files: Vec<UploadedFile>) -> Result<Vec<String>, ServiceError> {
        let mut references = Vec::with_capacity(files.len());
        for file in files {
            match self.attachments.put(file).await {
                Ok(reference) => references.push(reference),
                Err(err) => {
                    self.discard_attachments(&references).await;
                    return Err(err.into());
                }
            }
        }
        Ok(references)
    }

    async fn discard_attachments(&self, references: &[String]) {
        for reference in references {
            if let Err(err) = self.attachments.remove(reference).await {
                warn!(attachment = %reference, error = %err, "failed to remove attachment");
            }
        }
    }

    async fn forward_attachments(&self, ticket_key: &str, references: &[String]) {
        let timeout = self.config.tickets().timeout;
        for reference in references {
            let bytes = match self.attachments.read(reference).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(attachment = %reference, error = %err, "attachment unreadable; not forwarded");
                    continue;
                }
            };
            let attachment = TicketAttachment {
                file_name: display_name(reference).to_string(),
                bytes,
            };
            match tokio::time::timeout(timeout, self.bridge.attach_file(ticket_key, attachment)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(ticket = %ticket_key, attachment = %reference, error = %err, "attachment rejected by tracker")
                }
                Err(_) => {
                    warn!(ticket = %ticket_key, attachment = %reference, "attachment upload timed out")
                }
            }
        }
    }

    fn ticket_request(&self, room: &RoomEntity, issue: &IssueEntity) -> TicketRequest {
        let summary = truncate_summary(
            &format!(
                "[{}] line {}: {}",
                room.name, issue.script_line_ref, issue.description
            ),
            TICKET_SUMMARY_MAX_CHARS,
        );

        let flags = [
            (issue.flags.is_blocking, "blocking"),
            (issue.flags.is_bug, "bug"),
            (issue.flags.is_suggestion, "suggestion"),
            (issue.flags.is_question, "question"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect::<Vec<_>>();

        let mut body = vec![
            TicketSection {
                heading: "Description".into(),
                text: issue.description.clone(),
            },
            TicketSection {
                heading: "Context".into(),
                text: format!(
                    "Room: {}\nScript line: {}\nReported by: {}",
                    room.name, issue.script_line_ref, issue.creator_id
                ),
            },
        ];
        if !flags.is_empty() {
            body.push(TicketSection {
                heading: "Classification".into(),
                text: flags.join(", "),
            });
        }

        let tickets = self.config.tickets();
        TicketRequest {
            summary,
            body,
            project_key: tickets.project_key.clone(),
            issue_type: tickets.issue_type.clone(),
        }
    }
}

/// Map a requested status onto the room's tags. Null, empty and `open` clear the status.
fn resolve_status(requested: Option<&str>, tags: &[String]) -> Result<String, ServiceError> {
    match requested.map(str::trim) {
        None | Some("") => Ok(STATUS_OPEN.to_string()),
        Some(value) if value == STATUS_OPEN => Ok(STATUS_OPEN.to_string()),
        Some(value) if tags.iter().any(|tag| tag == value) => Ok(value.to_string()),
        Some(value) => Err(ServiceError::InvalidInput(format!(
            "unknown status `{value}` for this room"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::{issue::LineRefInput, room::CreateRoomRequest},
        services::test_support::{CacheOp, Harness},
    };

    struct Room {
        id: Uuid,
        groupier: Identity,
        member: Identity,
    }

    async fn room(harness: &Harness) -> Room {
        let groupier = Identity::new(Uuid::new_v4()).with_display_name("Lead");
        let summary = harness
            .rooms
            .create_room(
                &groupier,
                CreateRoomRequest {
                    name: "Sprint Test".into(),
                    template_script_id: None,
                    status_tags: None,
                },
            )
            .await
            .unwrap();
        let member = Identity::new(Uuid::new_v4()).with_display_name("Tester");
        harness.rooms.join_room(&member, summary.id).await.unwrap();
        Room {
            id: summary.id,
            groupier,
            member,
        }
    }

    fn request(line: &str, description: &str) -> CreateIssueRequest {
        CreateIssueRequest {
            script_line_ref: Some(LineRefInput::Text(line.into())),
            description: Some(description.into()),
            is_bug: true,
            ..CreateIssueRequest::default()
        }
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            bytes: name.as_bytes().to_vec(),
        }
    }

    async fn issue(harness: &Harness, room: &Room) -> IssueSummary {
        harness
            .issues
            .create_issue(&room.member, room.id, request("3", "button is dead"), vec![], None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn strangers_are_refused_before_any_listing() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let stranger = Identity::new(Uuid::new_v4());

        let err = harness.issues.list_issues(&stranger, room.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(harness.store.call_count("list_issues"), 0);
        assert!(harness.cache.ops().is_empty());

        let err = harness
            .issues
            .create_issue(&stranger, room.id, request("1", "x"), vec![file("a.png")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(harness.store.call_count("insert_issue"), 0);
        assert_eq!(harness.attachments.len(), 0);
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected_before_persistence() {
        let harness = Harness::new();
        let room = room(&harness).await;

        for bad in [
            request("3a", "valid"),
            request("-1", "valid"),
            request("", "valid"),
            request("2", "   "),
            CreateIssueRequest {
                description: Some("no line".into()),
                ..CreateIssueRequest::default()
            },
        ] {
            let err = harness
                .issues
                .create_issue(&room.member, room.id, bad, vec![file("log.txt")], None)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)));
        }
        assert_eq!(harness.store.call_count("insert_issue"), 0);
        assert_eq!(harness.attachments.len(), 0);
        assert!(harness.broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn numeric_line_refs_are_accepted_as_json_numbers() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let request: CreateIssueRequest = serde_json::from_value(serde_json::json!({
            "script_line_ref": 7,
            "description": "typo"
        }))
        .unwrap();

        let created = harness
            .issues
            .create_issue(&room.member, room.id, request, vec![], None)
            .await
            .unwrap();
        assert_eq!(created.script_line_ref, 7);
        assert_eq!(created.status, STATUS_OPEN);
    }

    #[tokio::test]
    async fn creation_invalidates_then_publishes() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let origin = Uuid::new_v4();

        assert!(harness.issues.list_issues(&room.member, room.id).await.unwrap().is_empty());
        harness.cache.clear_log();

        let created = harness
            .issues
            .create_issue(
                &room.member,
                room.id,
                request("3", "button is dead"),
                vec![file("shot.png")],
                Some(origin),
            )
            .await
            .unwrap();
        assert_eq!(created.attachments.len(), 1);
        assert!(harness.attachments.contains(&created.attachments[0]));

        assert_eq!(
            harness.cache.ops(),
            vec![
                CacheOp::Delete(room_issues_key(room.id)),
                CacheOp::Delete(room_leaderboard_key(room.id)),
            ]
        );
        harness.timeline.assert_invalidated_before_publish(
            &[room_issues_key(room.id), room_leaderboard_key(room.id)],
            "issue.created",
        );
        let events = harness.broadcaster.events();
        assert_eq!(
            events,
            vec![(room.id, RoomEvent::IssueCreated(created.clone()), Some(origin))]
        );

        let listed = harness.issues.list_issues(&room.member, room.id).await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn failed_insert_removes_committed_attachments() {
        let harness = Harness::new();
        let room = room(&harness).await;
        harness.store.fail_writes("issues", true);

        let err = harness
            .issues
            .create_issue(
                &room.member,
                room.id,
                request("1", "crash"),
                vec![file("a.log"), file("b.log")],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Internal(_)));
        assert_eq!(harness.attachments.len(), 0);
        assert!(harness.cache.deleted().is_empty());
        assert!(harness.broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn status_set_then_cleared_returns_to_open() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = issue(&harness, &room).await;

        let fixed = harness
            .issues
            .update_status(
                &room.groupier,
                issue.id,
                UpdateStatusRequest {
                    status: Some("fixed".into()),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(fixed.status, "fixed");

        for clear in [None, Some(String::new()), Some("open".to_string())] {
            harness
                .issues
                .update_status(&room.groupier, issue.id, UpdateStatusRequest { status: Some("fixed".into()) }, None)
                .await
                .unwrap();
            let cleared = harness
                .issues
                .update_status(&room.groupier, issue.id, UpdateStatusRequest { status: clear }, None)
                .await
                .unwrap();
            assert_eq!(cleared.status, STATUS_OPEN);
        }
    }

    #[tokio::test]
    async fn unknown_tags_and_plain_members_cannot_change_status() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = issue(&harness, &room).await;
        harness.cache.clear_log();

        let err = harness
            .issues
            .update_status(
                &room.groupier,
                issue.id,
                UpdateStatusRequest {
                    status: Some("shipped".into()),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = harness
            .issues
            .update_status(
                &room.member,
                issue.id,
                UpdateStatusRequest {
                    status: Some("fixed".into()),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let listed = harness.issues.list_issues(&room.member, room.id).await.unwrap();
        assert_eq!(listed[0].status, STATUS_OPEN);
        assert_eq!(harness.store.call_count("update_issue_status"), 0);
    }

    #[tokio::test]
    async fn status_update_invalidates_the_issue_list() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = issue(&harness, &room).await;
        harness.issues.list_issues(&room.member, room.id).await.unwrap();
        harness.cache.clear_log();

        harness
            .issues
            .update_status(
                &room.groupier,
                issue.id,
                UpdateStatusRequest {
                    status: Some("wont_fix".into()),
                },
                None,
            )
            .await
            .unwrap();
        harness.timeline.assert_invalidated_before_publish(
            &[room_issues_key(room.id), room_leaderboard_key(room.id)],
            "issue.updated",
        );

        let listed = harness.issues.list_issues(&room.member, room.id).await.unwrap();
        assert_eq!(listed[0].status, "wont_fix");
    }

    #[tokio::test]
    async fn ticket_linking_is_idempotent() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = harness
            .issues
            .create_issue(
                &room.member,
                room.id,
                request("2", "totals are wrong"),
                vec![file("totals.csv")],
                None,
            )
            .await
            .unwrap();
        harness.cache.clear_log();

        let first = harness
            .issues
            .link_ticket(&room.member, issue.id, None)
            .await
            .unwrap();
        harness.timeline.assert_invalidated_before_publish(
            &[room_issues_key(room.id), room_leaderboard_key(room.id)],
            "issue.updated",
        );
        let second = harness
            .issues
            .link_ticket(&room.groupier, issue.id, None)
            .await
            .unwrap();

        assert_eq!(first.ticket_key, "QA-1");
        assert_eq!(second.ticket_key, first.ticket_key);
        assert_eq!(harness.bridge.filed(), 1);
        assert_eq!(
            harness.bridge.attached(),
            vec![("QA-1".to_string(), "totals.csv".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_linking_stores_nothing() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = issue(&harness, &room).await;
        harness.bridge.fail_with(TicketError::Forbidden);
        harness.cache.clear_log();

        let err = harness
            .issues
            .link_ticket(&room.member, issue.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::External(TicketError::Forbidden)));
        assert_eq!(harness.store.call_count("link_issue_ticket"), 0);
        assert!(harness.cache.deleted().is_empty());
        let stored = harness.store.find_issue(issue.id).await.unwrap().unwrap();
        assert!(stored.ticket_key.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_tracker_times_out_as_unavailable() {
        let mut config = AppConfig::with_rules(vec![], vec![]);
        config.set_ticket_timeout(Duration::from_secs(2));
        let harness = Harness::with_config(config);
        let room = room(&harness).await;
        let issue = issue(&harness, &room).await;
        harness.bridge.hang();

        let err = harness
            .issues
            .link_ticket(&room.member, issue.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::External(TicketError::Unavailable(_))));
    }

    #[tokio::test]
    async fn only_creator_or_groupier_may_link_or_delete() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = issue(&harness, &room).await;
        let bystander = Identity::new(Uuid::new_v4());
        harness.rooms.join_room(&bystander, room.id).await.unwrap();

        assert!(matches!(
            harness.issues.link_ticket(&bystander, issue.id, None).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            harness.issues.delete_issue(&bystander, issue.id, None).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(harness.bridge.filed(), 0);
        assert_eq!(harness.store.call_count("delete_issue"), 0);
    }

    #[tokio::test]
    async fn deletion_publishes_identifier_and_cleans_attachments() {
        let harness = Harness::new();
        let room = room(&harness).await;
        let issue = harness
            .issues
            .create_issue(&room.member, room.id, request("1", "gone"), vec![file("x.png")], None)
            .await
            .unwrap();
        harness.cache.clear_log();

        harness
            .issues
            .delete_issue(&room.groupier, issue.id, None)
            .await
            .unwrap();

        assert_eq!(
            harness.cache.deleted(),
            vec![room_issues_key(room.id), room_leaderboard_key(room.id)]
        );
        harness.timeline.assert_invalidated_before_publish(
            &[room_issues_key(room.id), room_leaderboard_key(room.id)],
            "issue.deleted",
        );
        let events = harness.broadcaster.events();
        assert_eq!(
            events.last().map(|(_, event, _)| event.clone()),
            Some(RoomEvent::IssueDeleted { id: issue.id })
        );

        for _ in 0..10 {
            if harness.attachments.len() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(harness.attachments.len(), 0);

        assert!(matches!(
            harness.issues.delete_issue(&room.groupier, issue.id, None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn status_resolution_accepts_tags_and_clear_sentinels() {
        let tags = vec!["fixed".to_string()];
        assert_eq!(resolve_status(Some(" fixed "), &tags).unwrap(), "fixed");
        assert_eq!(resolve_status(None, &tags).unwrap(), STATUS_OPEN);
        assert_eq!(resolve_status(Some(""), &tags).unwrap(), STATUS_OPEN);
        assert_eq!(resolve_status(Some("open"), &tags).unwrap(), STATUS_OPEN);
        assert!(resolve_status(Some("FIXED"), &tags).is_err());
    }
}
