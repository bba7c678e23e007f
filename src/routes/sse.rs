use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::StreamQuery,
    error::AppError,
    services::{
        session_service,
        sse_service::{self, StreamSubscriber},
    },
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/sessions/{id}",
    tag = "sse",
    params(
        ("id" = String, Path, description = "Session identifier"),
        StreamQuery
    ),
    responses(
        (
            status = 200,
            description = "Session event stream",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 404, description = "Unknown session")
    )
)]
/// Stream every event of one session, starting with a `connected` handshake.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let receiver = session_service::subscribe(&state, &id)?;
    let subscriber = StreamSubscriber {
        session_id: id,
        player_id: query.player_id.unwrap_or_else(|| "spectator".into()),
    };
    info!(
        session_id = %subscriber.session_id,
        player_id = %subscriber.player_id,
        "new session SSE connection"
    );
    Ok(sse_service::to_sse_stream(
        receiver,
        subscriber,
        state.config().sse_keep_alive(),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/sessions/{id}", get(session_stream))
}
