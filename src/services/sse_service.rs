use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::dto::{
    events::SessionEvent,
    sse::{Handshake, ServerEvent},
};

const EVENT_CONNECTED: &str = "connected";

/// Identifies the subscriber of a stream for logging.
#[derive(Clone, Debug)]
pub struct StreamSubscriber {
    /// Session the stream follows.
    pub session_id: String,
    /// Player reported by the client, or `spectator`.
    pub player_id: String,
}

impl StreamSubscriber {
    fn handshake(&self) -> Handshake {
        Handshake {
            session_id: self.session_id.clone(),
            player_id: self.player_id.clone(),
            timestamp: crate::dto::now_rfc3339(),
            message: format!("subscribed to session {}", self.session_id),
        }
    }
}

/// Convert a session receiver into an SSE response. The first event is the
/// `connected` handshake, then every session event follows until the client
/// disconnects or the session is dropped.
pub fn to_sse_stream(
    receiver: broadcast::Receiver<SessionEvent>,
    subscriber: StreamSubscriber,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(spawn_forwarder(receiver, subscriber))
        .map(|payload| Ok(into_sse_event(payload)));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}

/// Relay the handshake and then every session event into a small bounded
/// channel read by the response stream.
fn spawn_forwarder(
    mut receiver: broadcast::Receiver<SessionEvent>,
    subscriber: StreamSubscriber,
) -> mpsc::Receiver<ServerEvent> {
    let (tx, rx) = mpsc::channel::<ServerEvent>(8);

    tokio::spawn(async move {
        match ServerEvent::json(Some(EVENT_CONNECTED.to_string()), &subscriber.handshake()) {
            Ok(handshake) => {
                if tx.send(handshake).await.is_err() {
                    return;
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize SSE handshake"),
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(event) => {
                            let payload = match ServerEvent::try_from(&event) {
                                Ok(payload) => payload,
                                Err(err) => {
                                    warn!(
                                        error = %err,
                                        event = event.name(),
                                        "failed to serialize session event"
                                    );
                                    continue;
                                }
                            };
                            if tx.send(payload).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                session_id = %subscriber.session_id,
                                player_id = %subscriber.player_id,
                                skipped,
                                "SSE subscriber lagged behind"
                            );
                            continue;
                        }
                    }
                }
            }
        }

        info!(
            session_id = %subscriber.session_id,
            player_id = %subscriber.player_id,
            "session SSE stream disconnected"
        );
    });

    rx
}

fn into_sse_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        services::session_service,
        state::AppState,
    };

    fn subscriber(session_id: &str) -> StreamSubscriber {
        StreamSubscriber {
            session_id: session_id.to_string(),
            player_id: "watcher".into(),
        }
    }

    #[tokio::test]
    async fn handshake_is_the_first_event() {
        let state = AppState::new(AppConfig::default());
        let session_id = session_service::create_session(&state).session_id;
        let receiver = session_service::subscribe(&state, &session_id).unwrap();

        let mut events = spawn_forwarder(receiver, subscriber(&session_id));
        let first = events.recv().await.unwrap();

        assert_eq!(first.event.as_deref(), Some("connected"));
        let data: serde_json::Value = serde_json::from_str(&first.data).unwrap();
        assert_eq!(data["session_id"], session_id.as_str());
        assert_eq!(data["player_id"], "watcher");
    }

    #[tokio::test]
    async fn session_events_follow_the_handshake() {
        let state = AppState::new(AppConfig::default());
        let session_id = session_service::create_session(&state).session_id;
        let receiver = session_service::subscribe(&state, &session_id).unwrap();
        let mut events = spawn_forwarder(receiver, subscriber(&session_id));

        session_service::join_session(
            &state,
            &session_id,
            crate::dto::session::JoinSessionRequest {
                player_id: Some("p1".into()),
            },
        )
        .unwrap();

        let names: Vec<_> = [events.recv().await, events.recv().await]
            .into_iter()
            .map(|e| e.unwrap().event)
            .collect();
        assert_eq!(
            names,
            [Some("connected".to_string()), Some("player_joined".to_string())]
        );
    }
}
