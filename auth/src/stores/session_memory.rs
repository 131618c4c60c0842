//! In-memory session store for tests and local development.

use crate::error::{AuthError, Result};
use crate::session::{Session, SessionId, SessionStore};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// `HashMap`-backed session store.
///
/// Never expires entries on its own; the verifier checks `expires_at`.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn session_count(&self) -> Result<usize> {
        Ok(lock(&self.sessions)?.len())
    }
}

fn lock(
    sessions: &Mutex<HashMap<SessionId, Session>>,
) -> Result<MutexGuard<'_, HashMap<SessionId, Session>>> {
    sessions
        .lock()
        .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let session = session.clone();

        async move {
            let mut guard = lock(&sessions)?;
            if guard.contains_key(&session.session_id) {
                return Err(AuthError::SessionExists);
            }
            guard.insert(session.session_id, session);
            Ok(())
        }
    }

    fn get_session(&self, session_id: SessionId) -> impl Future<Output = Result<Session>> + Send {
        let sessions = Arc::clone(&self.sessions);

        async move {
            lock(&sessions)?
                .get(&session_id)
                .cloned()
                .ok_or(AuthError::SessionNotFound)
        }
    }

    fn delete_session(&self, session_id: SessionId) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);

        async move {
            lock(&sessions)?.remove(&session_id);
            Ok(())
        }
    }
}
