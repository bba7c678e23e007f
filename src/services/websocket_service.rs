use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::SessionEvent,
        session::{JoinSessionRequest, JoinSessionResponse},
        ws::{PlayerInboundMessage, PlayerOutboundMessage},
    },
    error::ServiceError,
    services::session_service,
    state::SharedState,
};

/// Internal error type for player message handling.
///
/// Distinct from `ServiceError`, which is shared with the HTTP layer.
#[derive(Debug, Error)]
enum WsError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// The message needs a joined session.
    #[error("join a session first")]
    NotInSession,
    /// The connection already plays in another session.
    #[error("already in session `{0}`")]
    AlreadyInSession(String),
    /// Message type not understood.
    #[error("unsupported message")]
    Unsupported,
    /// Error from the session service.
    #[error("{0}")]
    Service(#[from] ServiceError),
}

/// Session joined by a connection, with the task relaying its events.
struct JoinedSession {
    session_id: String,
    forwarder: JoinHandle<()>,
}

/// Per-connection context.
struct Connection {
    state: SharedState,
    player_id: String,
    outbound_tx: mpsc::UnboundedSender<Message>,
    joined: Option<JoinedSession>,
}

/// Handle the full lifecycle of one player WebSocket connection.
///
/// The connection gets its own player id. Closing the socket leaves the
/// joined session.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection {
        state,
        player_id: Uuid::new_v4().to_string(),
        outbound_tx: outbound_tx.clone(),
        joined: None,
    };
    info!(player_id = %conn.player_id, "player connected");

    let connected = PlayerOutboundMessage::Connected {
        player_id: conn.player_id.clone(),
    };
    if send_message_to_websocket(&outbound_tx, &connected).is_err() {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(player_id = %conn.player_id, payload = %text, "received player message");

                let res = match PlayerInboundMessage::from_json_str(&text) {
                    Ok(msg) => conn.handle(msg),
                    Err(err) => {
                        warn!(
                            player_id = %conn.player_id,
                            error = %err,
                            "failed to parse player message"
                        );
                        Err(WsError::Unsupported)
                    }
                };
                if let Err(err) = res {
                    if matches!(err, WsError::ConnectionClosed) {
                        info!(
                            player_id = %conn.player_id,
                            "connection closed while replying, terminating"
                        );
                        break;
                    }
                    warn!(player_id = %conn.player_id, error = %err, "player message rejected");
                    if conn.reply(&PlayerOutboundMessage::error(err.to_string())).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(player_id = %conn.player_id, "player closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id = %conn.player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    conn.leave_joined();
    info!(player_id = %conn.player_id, "player disconnected");

    drop(conn);
    finalize(writer_task, outbound_tx).await;
}

impl Connection {
    fn handle(&mut self, message: PlayerInboundMessage) -> Result<(), WsError> {
        match message {
            PlayerInboundMessage::CreateSession => {
                self.ensure_free(None)?;
                let created = session_service::create_session(&self.state);
                self.reply(&PlayerOutboundMessage::SessionCreated {
                    session_id: created.session_id.clone(),
                })?;
                self.join(created.session_id)
            }
            PlayerInboundMessage::JoinSession { session_id } => {
                self.ensure_free(Some(&session_id))?;
                self.join(session_id)
            }
            PlayerInboundMessage::BeginTurn => {
                let session_id = self.session_id()?;
                session_service::begin_turn(&self.state, session_id, &self.player_id)?;
                Ok(())
            }
            PlayerInboundMessage::KeyPress { key } => {
                let session_id = self.session_id()?;
                let ack = session_service::record_key_press(
                    &self.state,
                    session_id,
                    &self.player_id,
                    key,
                )?;
                self.reply(&PlayerOutboundMessage::KeyPressAck(ack))
            }
            PlayerInboundMessage::SubmitKeyPresses { presses } => {
                let session_id = self.session_id()?;
                session_service::submit_key_presses(
                    &self.state,
                    session_id,
                    &self.player_id,
                    &presses,
                )?;
                Ok(())
            }
            PlayerInboundMessage::LeaveSession => {
                self.session_id()?;
                self.leave_joined();
                Ok(())
            }
            PlayerInboundMessage::Unknown => Err(WsError::Unsupported),
        }
    }

    /// Subscribe to the session before joining so this player also receives
    /// the events its own join triggers.
    fn join(&mut self, session_id: String) -> Result<(), WsError> {
        if self
            .joined
            .as_ref()
            .is_some_and(|joined| joined.session_id == session_id)
        {
            let joined = self.join_request(&session_id)?;
            return self.reply(&PlayerOutboundMessage::SessionJoined(joined));
        }

        let receiver = session_service::subscribe(&self.state, &session_id)?;
        let forwarder = spawn_forwarder(receiver, self.outbound_tx.clone());

        match self.join_request(&session_id) {
            Ok(joined) => {
                self.joined = Some(JoinedSession {
                    session_id,
                    forwarder,
                });
                self.reply(&PlayerOutboundMessage::SessionJoined(joined))
            }
            Err(WsError::Service(ServiceError::SessionFull(_))) => {
                forwarder.abort();
                self.reply(&PlayerOutboundMessage::SessionFull { session_id })
            }
            Err(err) => {
                forwarder.abort();
                Err(err)
            }
        }
    }

    fn join_request(&self, session_id: &str) -> Result<JoinSessionResponse, WsError> {
        let request = JoinSessionRequest {
            player_id: Some(self.player_id.clone()),
        };
        Ok(session_service::join_session(&self.state, session_id, request)?)
    }

    fn ensure_free(&self, target: Option<&str>) -> Result<(), WsError> {
        match &self.joined {
            Some(joined) if target != Some(joined.session_id.as_str()) => {
                Err(WsError::AlreadyInSession(joined.session_id.clone()))
            }
            _ => Ok(()),
        }
    }

    fn session_id(&self) -> Result<&str, WsError> {
        self.joined
            .as_ref()
            .map(|joined| joined.session_id.as_str())
            .ok_or(WsError::NotInSession)
    }

    fn leave_joined(&mut self) {
        let Some(joined) = self.joined.take() else {
            return;
        };
        joined.forwarder.abort();

        if let Err(err) =
            session_service::leave_session(&self.state, &joined.session_id, &self.player_id)
        {
            warn!(
                session_id = %joined.session_id,
                player_id = %self.player_id,
                error = %err,
                "failed to leave session"
            );
        }
    }

    fn reply(&self, message: &PlayerOutboundMessage) -> Result<(), WsError> {
        send_message_to_websocket(&self.outbound_tx, message)
    }
}

/// Relay session events to the socket until either side goes away.
fn spawn_forwarder(
    mut receiver: broadcast::Receiver<SessionEvent>,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if send_message_to_websocket(&tx, &event).is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagged behind");
                    continue;
                }
            }
        }
    })
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Returns `Ok(())` if the message was queued or if serialization failed
/// (permanent error, no point retrying).
/// Returns `Err(WsError::ConnectionClosed)` if the writer channel is closed.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), WsError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| WsError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use tokio::time::timeout;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    type Client = (Connection, mpsc::UnboundedReceiver<Message>);

    fn connection(state: &SharedState, player: &str) -> Client {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let conn = Connection {
            state: state.clone(),
            player_id: player.to_string(),
            outbound_tx,
            joined: None,
        };
        (conn, outbound_rx)
    }

    async fn next_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        let message = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no outbound message in time")
            .expect("outbound channel closed");
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    async fn next_of_type(rx: &mut mpsc::UnboundedReceiver<Message>, kind: &str) -> Value {
        loop {
            let value = next_json(rx).await;
            if value["type"] == kind {
                return value;
            }
        }
    }

    /// Two connections sharing a running session.
    fn pair(state: &SharedState) -> (Client, Client, String) {
        let (mut host, host_rx) = connection(state, "host");
        host.handle(PlayerInboundMessage::CreateSession).unwrap();
        let session_id = host.session_id().unwrap().to_string();

        let (mut guest, guest_rx) = connection(state, "guest");
        guest
            .handle(PlayerInboundMessage::JoinSession {
                session_id: session_id.clone(),
            })
            .unwrap();

        ((host, host_rx), (guest, guest_rx), session_id)
    }

    #[tokio::test]
    async fn third_connection_is_told_the_session_is_full() {
        let state = AppState::new(AppConfig::default());
        let (_host, _guest, session_id) = pair(&state);

        let (mut late, mut late_rx) = connection(&state, "late");
        late.handle(PlayerInboundMessage::JoinSession {
            session_id: session_id.clone(),
        })
        .unwrap();

        let reply = next_json(&mut late_rx).await;
        assert_eq!(reply["type"], "session_full");
        assert_eq!(reply["session_id"], session_id.as_str());
        assert!(late.joined.is_none());
    }

    #[tokio::test]
    async fn joined_connection_cannot_open_another_session() {
        let state = AppState::new(AppConfig::default());
        let ((mut host, mut host_rx), _guest, session_id) = pair(&state);

        let err = host.handle(PlayerInboundMessage::CreateSession).unwrap_err();
        assert!(matches!(err, WsError::AlreadyInSession(ref id) if *id == session_id));

        let other = session_service::create_session(&state).session_id;
        let err = host
            .handle(PlayerInboundMessage::JoinSession { session_id: other })
            .unwrap_err();
        assert!(matches!(err, WsError::AlreadyInSession(_)));

        // joining the same session again only repeats the confirmation
        host.handle(PlayerInboundMessage::JoinSession {
            session_id: session_id.clone(),
        })
        .unwrap();
        let joined = next_of_type(&mut host_rx, "session_joined").await;
        assert_eq!(joined["player_index"], 0);
    }

    #[tokio::test]
    async fn closing_the_socket_leaves_the_session() {
        let state = AppState::new(AppConfig::default());
        let ((mut host, _host_rx), (mut guest, mut guest_rx), _session_id) = pair(&state);
        next_of_type(&mut guest_rx, "game_start").await;

        host.leave_joined();
        let left = next_of_type(&mut guest_rx, "opponent_left").await;
        assert_eq!(left["player"], "host");
        assert_eq!(left["ended_game"], true);
        assert_eq!(state.sessions().len(), 1);

        guest.leave_joined();
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn messages_need_a_joined_session() {
        let state = AppState::new(AppConfig::default());
        let (mut conn, _rx) = connection(&state, "lonely");

        let err = conn.handle(PlayerInboundMessage::BeginTurn).unwrap_err();
        assert!(matches!(err, WsError::NotInSession));
    }
}
