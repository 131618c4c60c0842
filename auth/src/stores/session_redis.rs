//! Redis-based session store implementation.
//!
//! Sessions are stored in Redis with:
//! - **Primary key**: `session:{session_id}` → bincode-serialized [`Session`]
//! - **TTL**: derived from `expires_at`, so Redis drops the key on expiry
//!
//! # Example
//!
//! ```no_run
//! use rally_auth::stores::RedisSessionStore;
//!
//! # async fn example() -> Result<(), rally_auth::AuthError> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::session::{Session, SessionId, SessionStore};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Redis-based session store with TTL-based expiration.
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager; reconnects on its own.
    conn_manager: ConnectionManager,
}

impl RedisSessionStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unavailable`] if the connection cannot be made.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::InternalError(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Round-trip a `PING` for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns the mapped Redis error if the server does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn session_key(session_id: &SessionId) -> String {
        format!("session:{}", session_id.0)
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore").finish_non_exhaustive()
    }
}

impl SessionStore for RedisSessionStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session.session_id);
        let session_bytes = bincode::serialize(session)?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_seconds = session
            .expires_at
            .signed_duration_since(Utc::now())
            .num_seconds()
            .max(1) as u64;

        // SET NX EX: refuses to overwrite an existing session id
        let reply: Option<String> = redis::cmd("SET")
            .arg(&session_key)
            .arg(session_bytes)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        if reply.is_none() {
            return Err(AuthError::SessionExists);
        }

        tracing::info!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            ttl_seconds,
            "Created session in Redis"
        );

        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session_id);

        let session_bytes: Option<Vec<u8>> = conn.get(&session_key).await?;
        let bytes = session_bytes.ok_or(AuthError::SessionNotFound)?;

        Ok(bincode::deserialize(&bytes)?)
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(&session_id);

        let _: () = conn.del(&session_key).await?;

        tracing::info!(session_id = %session_id, "Deleted session from Redis");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rally_core::UserId;

    // Requires a running Redis instance:
    // docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_session_lifecycle() {
        let store = RedisSessionStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        store.ping().await.unwrap();

        let session = Session::new(UserId::new(), Utc::now(), Duration::hours(1));
        store.create_session(&session).await.unwrap();

        assert_eq!(
            store.create_session(&session).await.unwrap_err(),
            AuthError::SessionExists
        );
        assert_eq!(store.get_session(session.session_id).await.unwrap(), session);

        store.delete_session(session.session_id).await.unwrap();
        assert_eq!(
            store.get_session(session.session_id).await.unwrap_err(),
            AuthError::SessionNotFound
        );
    }
}
