use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness together with the number of sessions in memory.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let active_sessions = state.sessions().len();
    debug!(active_sessions, "health check");
    HealthResponse::ok(active_sessions)
}
