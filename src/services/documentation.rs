use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Climb Beat Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::begin_turn,
        crate::routes::sessions::record_key_press,
        crate::routes::sessions::submit_key_presses,
        crate::routes::sessions::leave_session,
        crate::routes::sse::session_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinSessionResponse,
            crate::dto::session::PlayerRequest,
            crate::dto::session::KeyPressRequest,
            crate::dto::session::KeyPressAck,
            crate::dto::session::SubmitKeyPressesRequest,
            crate::dto::session::ActionResponse,
            crate::dto::session::SessionSummary,
            crate::dto::phase::VisibleSessionPhase,
            crate::dto::events::SessionEvent,
            crate::dto::sse::Handshake,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::state::sequence::KeySymbol,
            crate::state::sequence::TargetStep,
            crate::state::sequence::KeyPress,
            crate::state::scoring::ScoreResult,
            crate::state::scoring::Grade,
            crate::state::session::ClimberPosition,
            crate::state::state_machine::FinishReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle and turns"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket operations for players"),
    )
)]
pub struct ApiDoc;
