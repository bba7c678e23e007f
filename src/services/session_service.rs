use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::SessionEvent,
        session::{
            ActionResponse, CreateSessionResponse, JoinSessionRequest, JoinSessionResponse,
            KeyPressAck, SessionSummary,
        },
        validation::validate_session_id,
    },
    error::ServiceError,
    services::session_events,
    state::{
        SharedState,
        sequence::{KeyPress, KeySymbol},
    },
};

/// Register a new session waiting for its players.
pub fn create_session(state: &SharedState) -> CreateSessionResponse {
    let session_id = state.sessions().create();
    info!(session_id = %session_id, active_sessions = state.sessions().len(), "session created");
    CreateSessionResponse { session_id }
}

/// Snapshot of a session.
pub fn get_session(state: &SharedState, session_id: &str) -> Result<SessionSummary, ServiceError> {
    ensure_session_id(session_id)?;
    state
        .sessions()
        .with_session(session_id, |session| SessionSummary::from(session))
}

/// Join a session, generating a player id when the request carries none.
///
/// Broadcasts `player_joined`, followed by `game_start` when this join filled
/// the session.
pub fn join_session(
    state: &SharedState,
    session_id: &str,
    request: JoinSessionRequest,
) -> Result<JoinSessionResponse, ServiceError> {
    ensure_session_id(session_id)?;
    let player_id = request
        .player_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let response = state
        .sessions()
        .join(session_id, &player_id, |session, hub, outcome| {
            if !outcome.rejoined {
                session_events::broadcast_player_joined(
                    hub,
                    session,
                    &player_id,
                    outcome.player_index,
                );
            }
            if outcome.started {
                session_events::broadcast_game_start(hub, session);
            }

            JoinSessionResponse {
                success: true,
                session_id: session_id.to_string(),
                player_id: player_id.clone(),
                player_index: outcome.player_index,
                is_your_turn: session.active_player().is_some_and(|p| *p == player_id),
            }
        });

    match &response {
        Ok(joined) => info!(
            session_id,
            player_id = %joined.player_id,
            player_index = joined.player_index,
            "player joined session"
        ),
        Err(err) => warn!(session_id, player_id = %player_id, error = %err, "join rejected"),
    }
    response
}

/// Begin the active player's turn and broadcast the sequence to play.
pub fn begin_turn(
    state: &SharedState,
    session_id: &str,
    player_id: &str,
) -> Result<ActionResponse, ServiceError> {
    ensure_session_id(session_id)?;
    state.sessions().with_session_mut(session_id, |session, hub| {
        let sequence = session.begin_turn(player_id, Instant::now())?;
        session_events::broadcast_turn_started(hub, session, player_id, sequence);
        Ok(())
    })?;

    info!(session_id, player_id, "turn started");
    Ok(ActionResponse::ok())
}

/// Record a key pressed now. The press that fills the sequence completes the
/// turn and broadcasts `turn_result`.
pub fn record_key_press(
    state: &SharedState,
    session_id: &str,
    player_id: &str,
    key: KeySymbol,
) -> Result<KeyPressAck, ServiceError> {
    ensure_session_id(session_id)?;
    state.sessions().with_session_mut(session_id, |session, hub| {
        let ack = match session.record_key_press(player_id, key, Instant::now())? {
            Some(outcome) => {
                let recorded = outcome.score.timing_deltas.len();
                session_events::broadcast_turn_result(hub, session, outcome);
                KeyPressAck {
                    accepted: true,
                    recorded,
                    completed: true,
                }
            }
            None => KeyPressAck {
                accepted: true,
                recorded: session.recorded_presses().len(),
                completed: false,
            },
        };
        Ok(ack)
    })
}

/// Complete the active player's turn with presses timed by the client.
pub fn submit_key_presses(
    state: &SharedState,
    session_id: &str,
    player_id: &str,
    presses: &[KeyPress],
) -> Result<ActionResponse, ServiceError> {
    ensure_session_id(session_id)?;
    state.sessions().with_session_mut(session_id, |session, hub| {
        let outcome = session.submit_key_presses(player_id, presses)?;
        info!(
            session_id,
            player_id,
            points = outcome.score.points,
            grade = %outcome.score.grade,
            move_count = outcome.move_count,
            game_over = outcome.is_game_over(),
            "turn scored"
        );
        session_events::broadcast_turn_result(hub, session, outcome);
        Ok(())
    })?;

    Ok(ActionResponse::ok())
}

/// Remove a player from a session. The last player out drops the session;
/// otherwise the remaining player receives `opponent_left`.
pub fn leave_session(
    state: &SharedState,
    session_id: &str,
    player_id: &str,
) -> Result<ActionResponse, ServiceError> {
    ensure_session_id(session_id)?;
    let outcome = state
        .sessions()
        .leave(session_id, player_id, |session, hub, outcome| {
            session_events::broadcast_opponent_left(hub, session, player_id, outcome);
        })?;

    info!(session_id, player_id, ended_game = outcome.ended_game, "player left session");
    if outcome.is_empty() {
        info!(session_id, active_sessions = state.sessions().len(), "session closed");
    }
    Ok(ActionResponse::ok())
}

/// Subscribe to the events of one session.
pub fn subscribe(
    state: &SharedState,
    session_id: &str,
) -> Result<broadcast::Receiver<SessionEvent>, ServiceError> {
    ensure_session_id(session_id)?;
    state
        .sessions()
        .get(session_id)
        .map(|handle| handle.events().subscribe())
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
}

fn ensure_session_id(session_id: &str) -> Result<(), ServiceError> {
    validate_session_id(session_id).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid session id `{session_id}`")),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        state::{AppState, state_machine::FinishReason},
    };

    const P1: &str = "player-one";
    const P2: &str = "player-two";

    fn join(state: &SharedState, session_id: &str, player: &str) -> JoinSessionResponse {
        join_session(
            state,
            session_id,
            JoinSessionRequest {
                player_id: Some(player.to_string()),
            },
        )
        .unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        names
    }

    fn started() -> (SharedState, String, broadcast::Receiver<SessionEvent>) {
        let state = AppState::new(AppConfig::default());
        let session_id = create_session(&state).session_id;
        let rx = subscribe(&state, &session_id).unwrap();
        join(&state, &session_id, P1);
        join(&state, &session_id, P2);
        (state, session_id, rx)
    }

    #[test]
    fn joining_two_players_starts_the_game() {
        let (state, session_id, mut rx) = started();
        assert_eq!(drain(&mut rx), ["player_joined", "player_joined", "game_start"]);

        let summary = get_session(&state, &session_id).unwrap();
        assert_eq!(summary.current_player.as_deref(), Some(P1));
        assert_eq!(summary.version, 1);
        assert_eq!(summary.sequence.map(|s| s.len()), Some(5));
    }

    #[test]
    fn join_without_player_id_generates_one() {
        let state = AppState::new(AppConfig::default());
        let session_id = create_session(&state).session_id;
        let joined = join_session(&state, &session_id, JoinSessionRequest::default()).unwrap();
        assert!(Uuid::parse_str(&joined.player_id).is_ok());
        assert_eq!(joined.player_index, 0);
        assert!(!joined.is_your_turn);
    }

    #[test]
    fn third_player_is_rejected() {
        let (state, session_id, _rx) = started();
        let err = join_session(
            &state,
            &session_id,
            JoinSessionRequest {
                player_id: Some("intruder".into()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::SessionFull(_)));
    }

    #[test]
    fn malformed_and_unknown_ids_are_distinguished() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            get_session(&state, "NOT-HEX!"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            get_session(&state, "deadbeef"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn perfect_turn_scores_and_hands_over() {
        let (state, session_id, mut rx) = started();
        drain(&mut rx);

        begin_turn(&state, &session_id, P1).unwrap();
        let presses = state
            .sessions()
            .with_session(&session_id, |s| s.sequence().map(|q| q.perfect_presses()))
            .unwrap()
            .unwrap();
        submit_key_presses(&state, &session_id, P1, &presses).unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
        let SessionEvent::TurnResult(result) = &events[1] else {
            panic!("expected turn_result, got {:?}", events[1]);
        };
        assert_eq!(result.score.points, 500);
        assert_eq!(result.next_player.as_deref(), Some(P2));
        assert_eq!(result.climbers[0].y, 80);
        assert!(!result.is_game_over);
    }

    #[test]
    fn wrong_player_cannot_begin() {
        let (state, session_id, _rx) = started();
        let err = begin_turn(&state, &session_id, P2).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn server_timed_presses_complete_the_turn() {
        let (state, session_id, mut rx) = started();
        begin_turn(&state, &session_id, P1).unwrap();
        drain(&mut rx);

        for i in 0..4 {
            let ack = record_key_press(&state, &session_id, P1, KeySymbol::A).unwrap();
            assert_eq!(ack.recorded, i + 1);
            assert!(!ack.completed);
        }
        let ack = record_key_press(&state, &session_id, P1, KeySymbol::A).unwrap();
        assert!(ack.completed);
        assert_eq!(drain(&mut rx), ["turn_result"]);

        let summary = get_session(&state, &session_id).unwrap();
        assert_eq!(summary.move_count, 1);
        assert_eq!(summary.current_player.as_deref(), Some(P2));
        // players ready, turn began, sequence completed
        assert_eq!(summary.version, 3);
    }

    #[test]
    fn leaving_a_running_game_notifies_the_opponent() {
        let (state, session_id, mut rx) = started();
        drain(&mut rx);

        leave_session(&state, &session_id, P1).unwrap();
        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let [SessionEvent::OpponentLeft(left)] = events.as_slice() else {
            panic!("expected a single opponent_left, got {events:?}");
        };
        assert_eq!(left.remaining_player, P2);
        assert!(left.ended_game);

        let summary = get_session(&state, &session_id).unwrap();
        assert_eq!(summary.finish_reason, Some(FinishReason::OpponentLeft));
    }

    #[test]
    fn last_player_out_drops_the_session() {
        let (state, session_id, _rx) = started();
        leave_session(&state, &session_id, P1).unwrap();
        leave_session(&state, &session_id, P2).unwrap();

        assert!(state.sessions().is_empty());
        assert!(matches!(
            begin_turn(&state, &session_id, P2),
            Err(ServiceError::NotFound(_))
        ));
    }
}
