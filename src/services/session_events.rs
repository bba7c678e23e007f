use tracing::debug;

use crate::{
    dto::events::{
        GameStartEvent, OpponentLeftEvent, PlayerJoinedEvent, SessionEvent, TurnResultEvent,
        TurnStartedEvent,
    },
    state::{
        EventHub,
        sequence::TargetSequence,
        session::Session,
        turns::{LeaveOutcome, TurnOutcome},
    },
};

/// Broadcast that `player` took a slot in the session.
pub fn broadcast_player_joined(
    hub: &EventHub,
    session: &Session,
    player: &str,
    player_index: usize,
) {
    send(
        hub,
        session,
        SessionEvent::PlayerJoined(PlayerJoinedEvent {
            player: player.to_string(),
            player_index,
            player_count: session.player_count(),
        }),
    );
}

/// Broadcast the start of the game with the first sequence.
pub fn broadcast_game_start(hub: &EventHub, session: &Session) {
    let Some(current_player) = session.active_player().cloned() else {
        return;
    };

    send(
        hub,
        session,
        SessionEvent::GameStart(GameStartEvent {
            players: session.players().iter().flatten().cloned().collect(),
            current_player,
            sequence: session.sequence().cloned().unwrap_or_default(),
        }),
    );
}

/// Broadcast that `player` began their turn.
pub fn broadcast_turn_started(
    hub: &EventHub,
    session: &Session,
    player: &str,
    sequence: TargetSequence,
) {
    send(
        hub,
        session,
        SessionEvent::TurnStarted(TurnStartedEvent {
            player: player.to_string(),
            sequence,
        }),
    );
}

/// Broadcast the scoring of a completed turn.
pub fn broadcast_turn_result(hub: &EventHub, session: &Session, outcome: TurnOutcome) {
    let is_game_over = outcome.is_game_over();
    let event = TurnResultEvent {
        player: outcome.player,
        player_index: outcome.player_index,
        score: outcome.score,
        total_score: outcome.total_score,
        scores: session.scores().to_vec(),
        next_player: outcome.next_player,
        sequence: outcome.next_sequence,
        climbers: outcome.climbers.to_vec(),
        move_count: outcome.move_count,
        turn_count: outcome.turn_count,
        is_game_over,
        finish_reason: outcome.finish_reason,
    };
    send(hub, session, SessionEvent::TurnResult(event));
}

/// Broadcast that `player` left while someone is still in the session.
pub fn broadcast_opponent_left(
    hub: &EventHub,
    session: &Session,
    player: &str,
    outcome: &LeaveOutcome,
) {
    let Some(remaining_player) = outcome.remaining.clone() else {
        return;
    };

    send(
        hub,
        session,
        SessionEvent::OpponentLeft(OpponentLeftEvent {
            player: player.to_string(),
            remaining_player,
            ended_game: outcome.ended_game,
        }),
    );
}

fn send(hub: &EventHub, session: &Session, event: SessionEvent) {
    debug!(
        session_id = %session.id(),
        event = event.name(),
        subscribers = hub.subscriber_count(),
        "broadcasting session event"
    );
    hub.broadcast(event);
}
