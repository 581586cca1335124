use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{TicketAttachment, TicketBridge, TicketError, TicketRequest, TicketSection};

/// Jira Cloud REST (v3) client.
#[derive(Clone)]
pub struct JiraBridge {
    client: Client,
    base_url: Arc<str>,
    user: Arc<str>,
    token: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

impl JiraBridge {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(
        base_url: &str,
        user: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TicketError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TicketError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            user: Arc::from(user.into()),
            token: Arc::from(token.into()),
        })
    }

    /// Read `JIRA_USER` and `JIRA_TOKEN`, returning `None` when either is missing.
    pub fn from_env(base_url: &str, timeout: Duration) -> Option<Result<Self, TicketError>> {
        let user = std::env::var("JIRA_USER").ok()?;
        let token = std::env::var("JIRA_TOKEN").ok()?;
        Some(Self::new(base_url, user, token, timeout))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/3/{}", self.base_url, path)
    }
}

/// Render sections as an Atlassian document.
fn render_body(sections: &[TicketSection]) -> Value {
    let mut content = Vec::new();
    for section in sections {
        content.push(json!({
            "type": "heading",
            "attrs": { "level": 3 },
            "content": [{ "type": "text", "text": section.heading }],
        }));
        if !section.text.is_empty() {
            content.push(json!({
                "type": "paragraph",
                "content": [{ "type": "text", "text": section.text }],
            }));
        }
    }
    json!({ "type": "doc", "version": 1, "content": content })
}

fn transport_error(err: reqwest::Error) -> TicketError {
    if err.is_timeout() {
        TicketError::Unavailable("request timed out".into())
    } else {
        TicketError::Unavailable(err.to_string())
    }
}

async fn classify_failure(response: reqwest::Response) -> TicketError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => TicketError::Unauthorized,
        StatusCode::FORBIDDEN => TicketError::Forbidden,
        StatusCode::BAD_REQUEST => {
            let detail = response.text().await.unwrap_or_default();
            TicketError::InvalidRequest(detail)
        }
        other => TicketError::Unavailable(format!("unexpected status {other}")),
    }
}

impl TicketBridge for JiraBridge {
    fn file_ticket(&self, request: TicketRequest) -> BoxFuture<'static, Result<String, TicketError>> {
        let bridge = self.clone();
        Box::pin(async move {
            let payload = json!({
                "fields": {
                    "project": { "key": request.project_key },
                    "summary": request.summary,
                    "description": render_body(&request.body),
                    "issuetype": { "name": request.issue_type },
                }
            });

            let response = bridge
                .client
                .post(bridge.url("issue"))
                .basic_auth(bridge.user.as_ref(), Some(bridge.token.as_ref()))
                .json(&payload)
                .send()
                .await
                .map_err(transport_error)?;

            if !response.status().is_success() {
                return Err(classify_failure(response).await);
            }

            let created = response
                .json::<CreatedIssue>()
                .await
                .map_err(|err| TicketError::Unavailable(format!("unreadable response: {err}")))?;
            debug!(key = %created.key, "ticket filed");
            Ok(created.key)
        })
    }

    fn attach_file(
        &self,
        ticket_key: &str,
        attachment: TicketAttachment,
    ) -> BoxFuture<'static, Result<(), TicketError>> {
        let bridge = self.clone();
        let path = format!("issue/{ticket_key}/attachments");
        Box::pin(async move {
            let form = Form::new().part(
                "file",
                Part::bytes(attachment.bytes).file_name(attachment.file_name),
            );
            let response = bridge
                .client
                .post(bridge.url(&path))
                .basic_auth(bridge.user.as_ref(), Some(bridge.token.as_ref()))
                .header("X-Atlassian-Token", "no-check")
                .multipart(form)
                .send()
                .await
                .map_err(transport_error)?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(classify_failure(response).await)
            }
        })
    }
}
