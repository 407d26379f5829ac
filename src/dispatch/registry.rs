//! Session registry — the single owner of every in-memory session.

use tokio::sync::{Mutex, MutexGuard};

use crate::conversation::UserSession;
use crate::store::SessionCollection;

/// Owns the session collection behind one lock.
///
/// Every read-modify-write happens through a [`SessionGuard`], so events
/// for the same or different users never race.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<SessionCollection>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously loaded collection.
    pub fn from_sessions(sessions: SessionCollection) -> Self {
        Self {
            sessions: Mutex::new(sessions),
        }
    }

    /// Acquire exclusive access to the collection.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            inner: self.sessions.lock().await,
        }
    }

    /// Return a copy of the user's session, registering a fresh one first if
    /// the user is new.
    pub async fn get_or_create(&self, user_id: i64) -> UserSession {
        self.lock().await.get_or_create(user_id).clone()
    }

    /// Copy of the whole collection.
    pub async fn snapshot(&self) -> SessionCollection {
        self.sessions.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Exclusive access to the collection for one event.
pub struct SessionGuard<'a> {
    inner: MutexGuard<'a, SessionCollection>,
}

impl SessionGuard<'_> {
    pub fn get_or_create(&mut self, user_id: i64) -> &mut UserSession {
        self.inner.entry(user_id).or_insert_with(|| {
            tracing::debug!(user_id, "New session registered");
            UserSession::new()
        })
    }

    pub fn sessions(&self) -> &SessionCollection {
        &self.inner
    }
}
