//! Session and identity state, backed by one shared [`MemoryDB`] store
//! via two typed façades — never a single cache with runtime type
//! assertions inside filters (see `DESIGN.md`).
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::memorydb::MemoryDB;
use crate::{Error, Result};

/// A server-side session record. `id` survives cookie rotation; `cookie`
/// is the rotating, client-visible value and lives in a distinct key
/// space in the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub cookie: String,
    pub expires: DateTime<Utc>,
}

/// The user-info record bound to a session id by the OAuth2 endpoint.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub identifier: String,
    pub username: String,
    pub email: String,
    pub picture: String,
    pub locale: String,
}

/// Generate a random-hex identifier of `bytes` bytes of entropy.
fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Time-ordered opaque id: a millisecond timestamp prefix (preserves
/// rough creation order for debugging/log correlation) followed by 128
/// bits of randomness, matching the ~122-bit entropy floor OWASP
/// recommends for session identifiers.
pub fn new_id() -> String {
    format!("{:012x}{}", Utc::now().timestamp_millis(), random_hex(16))
}

/// Opaque rotating cookie value: pure randomness, no timestamp prefix,
/// so it carries no information linking successive cookies for the same
/// session id.
pub fn new_cookie() -> String {
    random_hex(32)
}

const SESSION_PREFIX: &str = "session:";
const IDENTITY_PREFIX: &str = "identity:";

/// Façade over `M` mapping `cookie -> Session`, TTL-governed, with
/// unique-key insert semantics (spec: inserting an already-present
/// cookie must fail rather than overwrite).
#[derive(Clone)]
pub struct SessionCache<M: MemoryDB> {
    store: M,
    ttl: Duration,
}

impl<M: MemoryDB> SessionCache<M> {
    pub fn new(store: M, ttl_hours: u32) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(u64::from(ttl_hours) * 3600),
        }
    }

    fn key(cookie: &str) -> String {
        format!("{SESSION_PREFIX}{cookie}")
    }

    /// Insert `session`, keyed by its `cookie`. Fails if a session is
    /// already present under that cookie.
    pub async fn put(&self, session: &Session) -> Result<bool> {
        let body = serde_json::to_string(session)?;
        self.store
            .set_ex_nx(&Self::key(&session.cookie), &body, &self.ttl)
            .await
    }

    pub async fn get(&self, cookie: &str) -> Result<Option<Session>> {
        match self.store.get(&Self::key(cookie)).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, session: &Session) -> Result<()> {
        self.store.del(&Self::key(&session.cookie)).await?;
        Ok(())
    }

    pub fn new_id() -> String {
        new_id()
    }

    pub fn new_cookie() -> String {
        new_cookie()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Façade over `M` mapping `sessionId -> UserIdentity`, sharing the TTL
/// store with `SessionCache` but a disjoint key prefix, so cookie
/// rotation (which only touches `SessionCache` keys) never disturbs the
/// identity binding.
#[derive(Clone)]
pub struct IdentityCache<M: MemoryDB> {
    store: M,
    ttl: Duration,
}

impl<M: MemoryDB> IdentityCache<M> {
    pub fn new(store: M, ttl_hours: u32) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(u64::from(ttl_hours) * 3600),
        }
    }

    fn key(session_id: &str) -> String {
        format!("{IDENTITY_PREFIX}{session_id}")
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<UserIdentity>> {
        match self.store.get(&Self::key(session_id)).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Insert `identity` for `session_id`. Fails if one is already bound.
    pub async fn put(&self, session_id: &str, identity: &UserIdentity) -> Result<bool> {
        let body = serde_json::to_string(identity)?;
        self.store
            .set_ex_nx(&Self::key(session_id), &body, &self.ttl)
            .await
    }
}

pub(crate) fn conflict() -> Error {
    Error::Cache("key already present".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memorydb::default::DefaultBackend;

    fn sample_session() -> Session {
        Session {
            id: new_id(),
            cookie: new_cookie(),
            expires: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips_a_session() {
        let cache = SessionCache::new(DefaultBackend::new(None), 24);
        let session = sample_session();

        assert!(cache.put(&session).await.unwrap());
        let fetched = cache.get(&session.cookie).await.unwrap();
        assert_eq!(fetched, Some(session));
    }

    #[tokio::test]
    async fn put_rejects_a_cookie_already_in_use() {
        let cache = SessionCache::new(DefaultBackend::new(None), 24);
        let session = sample_session();

        assert!(cache.put(&session).await.unwrap());
        assert!(!cache.put(&session).await.unwrap());
    }

    #[tokio::test]
    async fn remove_drops_the_session() {
        let cache = SessionCache::new(DefaultBackend::new(None), 24);
        let session = sample_session();

        cache.put(&session).await.unwrap();
        cache.remove(&session).await.unwrap();
        assert_eq!(cache.get(&session.cookie).await.unwrap(), None);
    }

    #[tokio::test]
    async fn identity_cache_shares_the_backend_but_not_the_key_space() {
        let backend = DefaultBackend::new(None);
        let sessions = SessionCache::new(backend.clone(), 24);
        let identities = IdentityCache::new(backend, 24);

        let session = sample_session();
        sessions.put(&session).await.unwrap();

        let identity = UserIdentity {
            identifier: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            picture: "".into(),
            locale: "en".into(),
        };
        assert!(identities.put(&session.id, &identity).await.unwrap());
        assert_eq!(
            identities.get(&session.id).await.unwrap(),
            Some(identity)
        );
        assert!(sessions.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn identity_put_rejects_a_session_id_already_bound() {
        let identities = IdentityCache::new(DefaultBackend::new(None), 24);
        let identity = UserIdentity {
            identifier: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            picture: "".into(),
            locale: "en".into(),
        };

        assert!(identities.put("session-1", &identity).await.unwrap());
        assert!(!identities.put("session-1", &identity).await.unwrap());
    }
}
