//! Membership and role gates run before any room or issue logic.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::{
        models::{IssueEntity, MembershipEntity, UserEntity},
        store::Store,
    },
    error::ServiceError,
};

/// Caller identity as forwarded by the SSO proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Profile row recorded for this identity.
    pub fn to_user(&self) -> UserEntity {
        UserEntity {
            id: self.user_id,
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Read-only authorization checks backed by membership rows.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn Store>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fail with `Forbidden` unless `user_id` holds a membership in `room_id`.
    ///
    /// An unknown room is reported the same way so its existence does not leak.
    pub async fn require_member(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<MembershipEntity, ServiceError> {
        match self.store.find_membership(room_id, user_id).await? {
            Some(membership) => Ok(membership),
            None => {
                debug!(room = %room_id, user = %user_id, "membership gate refused");
                Err(ServiceError::Forbidden(format!(
                    "not a member of room `{room_id}`"
                )))
            }
        }
    }

    /// Fail with `Forbidden` unless `user_id` is a groupier of `room_id`.
    pub async fn require_groupier(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<MembershipEntity, ServiceError> {
        let membership = self.require_member(room_id, user_id).await?;
        if membership.is_groupier {
            Ok(membership)
        } else {
            debug!(room = %room_id, user = %user_id, "groupier gate refused");
            Err(ServiceError::Forbidden(
                "only groupiers may perform this action".into(),
            ))
        }
    }

    /// Load `issue_id` and require the caller to be its creator or a groupier of its room.
    pub async fn require_creator_or_groupier(
        &self,
        issue_id: Uuid,
        user_id: Uuid,
    ) -> Result<IssueEntity, ServiceError> {
        let issue = self
            .store
            .find_issue(issue_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("issue `{issue_id}` not found")))?;

        if issue.creator_id == user_id {
            return Ok(issue);
        }

        let membership = self.store.find_membership(issue.room_id, user_id).await?;
        if membership.is_some_and(|m| m.is_groupier) {
            Ok(issue)
        } else {
            debug!(issue = %issue_id, user = %user_id, "creator-or-groupier gate refused");
            Err(ServiceError::Forbidden(
                "only the issue creator or a groupier may perform this action".into(),
            ))
        }
    }
}
