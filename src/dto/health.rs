use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Realtime connections currently subscribed to a room.
    pub realtime_connections: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(realtime_connections: usize) -> Self {
        Self {
            status: "ok".to_string(),
            realtime_connections,
        }
    }

    /// Create a health response indicating the store cannot be reached.
    pub fn degraded(realtime_connections: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            realtime_connections,
        }
    }
}
