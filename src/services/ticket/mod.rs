//! Bridge to the external ticket tracker that mirrors issues as tickets.

#[cfg(feature = "jira-bridge")]
mod jira;

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

#[cfg(feature = "jira-bridge")]
pub use self::jira::JiraBridge;

/// Failure categories reported by the tracker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("tracker rejected the credentials")]
    Unauthorized,
    #[error("tracker denied access to the project")]
    Forbidden,
    #[error("tracker rejected the ticket: {0}")]
    InvalidRequest(String),
    #[error("tracker unavailable: {0}")]
    Unavailable(String),
}

/// One titled block of the ticket body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSection {
    pub heading: String,
    pub text: String,
}

/// Everything the tracker needs to open a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRequest {
    /// Single-line title, already capped to the tracker limit.
    pub summary: String,
    pub body: Vec<TicketSection>,
    pub project_key: String,
    pub issue_type: String,
}

/// File forwarded to an existing ticket.
#[derive(Debug, Clone)]
pub struct TicketAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Files tickets in the external tracker.
pub trait TicketBridge: Send + Sync {
    /// Open a ticket and return its key.
    fn file_ticket(&self, request: TicketRequest) -> BoxFuture<'static, Result<String, TicketError>>;
    /// Attach a file to a ticket. Callers treat failures as non-fatal.
    fn attach_file(
        &self,
        ticket_key: &str,
        attachment: TicketAttachment,
    ) -> BoxFuture<'static, Result<(), TicketError>>;
}

/// Bridge used when no tracker is configured: every call fails as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTicketBridge;

impl TicketBridge for DisabledTicketBridge {
    fn file_ticket(&self, _request: TicketRequest) -> BoxFuture<'static, Result<String, TicketError>> {
        async { Err(TicketError::Unavailable("ticket tracker not configured".into())) }.boxed()
    }

    fn attach_file(
        &self,
        _ticket_key: &str,
        _attachment: TicketAttachment,
    ) -> BoxFuture<'static, Result<(), TicketError>> {
        async { Err(TicketError::Unavailable("ticket tracker not configured".into())) }.boxed()
    }
}

/// Cap `summary` to `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_summary(summary: &str, max_chars: usize) -> String {
    let single_line = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut cut = single_line
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_are_flattened_and_capped() {
        assert_eq!(truncate_summary("a\n  b", 10), "a b");
        let long = "x".repeat(300);
        let capped = truncate_summary(&long, 255);
        assert_eq!(capped.chars().count(), 255);
        assert!(capped.ends_with('…'));
    }
}
