/// Membership and role gates.
pub mod access;
/// Storage boundary for issue attachments.
pub mod attachments;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Issue filing, triage, ticket mirroring and deletion.
pub mod issue_service;
/// WebSocket connection and message handling service.
pub mod realtime_service;
/// Room creation, membership, progress and leaderboard.
pub mod room_service;
/// Server-Sent Events room streams.
pub mod sse_service;
/// External ticket tracker bridge.
pub mod ticket;

#[cfg(test)]
pub(crate) mod test_support;
