use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::session::{
        ActionResponse, CreateSessionResponse, JoinSessionRequest, JoinSessionResponse,
        KeyPressAck, KeyPressRequest, PlayerRequest, SessionSummary, SubmitKeyPressesRequest,
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes driving a session from creation to the last turn.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/begin", post(begin_turn))
        .route("/sessions/{id}/key", post(record_key_press))
        .route("/sessions/{id}/presses", post(submit_key_presses))
        .route("/sessions/{id}/leave", post(leave_session))
}

/// Create a session waiting for two players.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse)
    )
)]
pub async fn create_session(State(state): State<SharedState>) -> Json<CreateSessionResponse> {
    Json(session_service::create_session(&state))
}

/// Inspect the full state of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session state", body = SessionSummary),
        (status = 400, description = "Malformed session identifier"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::get_session(&state, &id)?;
    Ok(Json(summary))
}

/// Join a session. The body is optional; a player id is generated when absent.
#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body(content = JoinSessionRequest, description = "Optional body"),
    responses(
        (status = 200, description = "Joined", body = JoinSessionResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session full or already running")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Option<Json<JoinSessionRequest>>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    request.validate()?;
    let joined = session_service::join_session(&state, &id, request)?;
    Ok(Json(joined))
}

/// Begin the caller's turn; the sequence is broadcast to the session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/begin",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Turn started", body = ActionResponse),
        (status = 409, description = "Not the caller's turn or wrong phase")
    )
)]
pub async fn begin_turn(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let response = session_service::begin_turn(&state, &id, &payload.player_id)?;
    Ok(Json(response))
}

/// Record one key pressed now, timed by the server.
#[utoipa::path(
    post,
    path = "/sessions/{id}/key",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = KeyPressRequest,
    responses(
        (status = 200, description = "Press recorded", body = KeyPressAck),
        (status = 409, description = "No active turn for the caller or buffer full")
    )
)]
pub async fn record_key_press(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<KeyPressRequest>,
) -> Result<Json<KeyPressAck>, AppError> {
    payload.validate()?;
    let ack = session_service::record_key_press(&state, &id, &payload.player_id, payload.key)?;
    Ok(Json(ack))
}

/// Submit client-timed presses and complete the caller's turn.
#[utoipa::path(
    post,
    path = "/sessions/{id}/presses",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = SubmitKeyPressesRequest,
    responses(
        (status = 200, description = "Turn scored", body = ActionResponse),
        (status = 400, description = "Too many presses"),
        (status = 409, description = "Not the caller's turn or wrong phase")
    )
)]
pub async fn submit_key_presses(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<SubmitKeyPressesRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let response =
        session_service::submit_key_presses(&state, &id, &payload.player_id, &payload.presses)?;
    Ok(Json(response))
}

/// Leave a session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/leave",
    tag = "sessions",
    params(("id" = String, Path, description = "Session identifier")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Left", body = ActionResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<PlayerRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let response = session_service::leave_session(&state, &id, &payload.player_id)?;
    Ok(Json(response))
}
