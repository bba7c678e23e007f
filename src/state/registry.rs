//! Registry of live sessions, addressed by short generated ids.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        hub::EventHub,
        session::{Session, SessionId},
        turns::{JoinOutcome, LeaveOutcome},
    },
};

/// Length of generated session identifiers.
pub const SESSION_ID_LENGTH: usize = 8;

/// One registered session: its state behind a single lock, plus its event hub.
pub struct SessionHandle {
    session: Mutex<Session>,
    events: EventHub,
}

impl SessionHandle {
    fn new(session: Session, event_capacity: usize) -> Self {
        Self {
            session: Mutex::new(session),
            events: EventHub::new(event_capacity),
        }
    }

    /// Lock the session. A poisoned lock is recovered since every engine
    /// operation leaves the session consistent before returning.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Event hub of this session.
    pub fn events(&self) -> &EventHub {
        &self.events
    }
}

/// Owns every live session, addressed by its generated identifier.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    event_capacity: usize,
}

impl SessionRegistry {
    /// Build an empty registry; each session hub buffers `event_capacity` events.
    pub fn new(event_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            event_capacity,
        }
    }

    /// Create a session waiting for players and return its identifier.
    pub fn create(&self) -> SessionId {
        loop {
            let mut id = Uuid::new_v4().simple().to_string();
            id.truncate(SESSION_ID_LENGTH);

            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                slot.insert(Arc::new(SessionHandle::new(
                    Session::new(id.clone()),
                    self.event_capacity,
                )));
                return id;
            }
            debug!(session_id = %id, "session id collision; drawing a new one");
        }
    }

    /// Look up a session handle.
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run `f` against a session without mutating it.
    pub fn with_session<F, T>(&self, id: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Session) -> T,
    {
        let entry = self.sessions.get(id).ok_or_else(|| not_found(id))?;
        let session = entry.lock();
        Ok(f(&session))
    }

    /// Run `f` against a session under its lock, with access to its event hub.
    ///
    /// The registry entry stays pinned for the duration of `f`, so a concurrent
    /// teardown cannot drop the session halfway through. `f` must not call
    /// back into the registry.
    pub fn with_session_mut<F, T>(&self, id: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Session, &EventHub) -> Result<T, ServiceError>,
    {
        let entry = self.sessions.get(id).ok_or_else(|| not_found(id))?;
        let handle = entry.value();
        let mut session = handle.lock();
        f(&mut session, handle.events())
    }

    /// Add `player` to the session, then run `notify` under the same lock so
    /// events it broadcasts are ordered with the join.
    pub fn join<F, T>(&self, id: &str, player: &str, notify: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Session, &EventHub, JoinOutcome) -> T,
    {
        self.with_session_mut(id, |session, hub| {
            let outcome = session.join(player)?;
            Ok(notify(session, hub, outcome))
        })
    }

    /// Remove `player` from the session, dropping the session once it is empty.
    ///
    /// `notify` runs under the session lock before any teardown.
    pub fn leave<F>(
        &self,
        id: &str,
        player: &str,
        notify: F,
    ) -> Result<LeaveOutcome, ServiceError>
    where
        F: FnOnce(&Session, &EventHub, &LeaveOutcome),
    {
        let outcome = self.with_session_mut(id, |session, hub| {
            let outcome = session.leave(player)?;
            notify(session, hub, &outcome);
            Ok(outcome)
        })?;
        if outcome.is_empty() {
            self.remove_if_empty(id);
        }
        Ok(outcome)
    }

    /// Drop the session if nobody is in it; returns whether it was removed.
    fn remove_if_empty(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, handle| handle.lock().player_count() == 0)
            .is_some();
        if removed {
            debug!(session_id = %id, "removed empty session");
        }
        removed
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("session `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::SessionPhase;

    #[test]
    fn created_sessions_have_short_unique_ids() {
        let registry = SessionRegistry::new(4);
        let ids: Vec<SessionId> = (0..64).map(|_| registry.create()).collect();

        assert_eq!(registry.len(), 64);
        for id in &ids {
            assert_eq!(id.len(), SESSION_ID_LENGTH);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn new_session_is_waiting_for_players() {
        let registry = SessionRegistry::new(4);
        let id = registry.create();

        let phase = registry.with_session(&id, Session::phase).unwrap();
        assert_eq!(phase, SessionPhase::WaitingForPlayers);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let registry = SessionRegistry::new(4);
        assert!(registry.get("00000000").is_none());
        assert!(matches!(
            registry.join("00000000", "p1", |_, _, outcome| outcome),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn third_player_is_rejected_as_full() {
        let registry = SessionRegistry::new(4);
        let id = registry.create();
        registry.join(&id, "p1", |_, _, _| ()).unwrap();
        registry.join(&id, "p2", |_, _, _| ()).unwrap();

        assert!(matches!(
            registry.join(&id, "p3", |_, _, outcome| outcome),
            Err(ServiceError::SessionFull(_))
        ));
    }

    #[test]
    fn session_is_removed_once_the_last_player_leaves() {
        let registry = SessionRegistry::new(4);
        let id = registry.create();
        registry.join(&id, "p1", |_, _, _| ()).unwrap();
        registry.join(&id, "p2", |_, _, _| ()).unwrap();

        let first = registry.leave(&id, "p1", |_, _, _| ()).unwrap();
        assert_eq!(first.remaining.as_deref(), Some("p2"));
        assert!(registry.get(&id).is_some());

        let last = registry.leave(&id, "p2", |_, _, _| ()).unwrap();
        assert!(last.is_empty());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn populated_sessions_are_not_removed() {
        let registry = SessionRegistry::new(4);
        let id = registry.create();
        registry.join(&id, "p1", |_, _, _| ()).unwrap();

        assert!(!registry.remove_if_empty(&id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn leave_notifies_under_the_lock_before_teardown() {
        let registry = SessionRegistry::new(4);
        let id = registry.create();
        registry.join(&id, "p1", |_, _, _| ()).unwrap();

        let mut seen = None;
        registry
            .leave(&id, "p1", |session, _, outcome| {
                seen = Some((session.player_count(), outcome.is_empty()));
            })
            .unwrap();

        assert_eq!(seen, Some((0, true)));
        assert!(registry.is_empty());
    }
}
