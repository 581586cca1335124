use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store and report the number of live realtime connections.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connections = state.hub().connection_count();
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(connections),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(connections)
        }
    }
}
