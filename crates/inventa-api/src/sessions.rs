use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::SigningKey;
use rand_core::{OsRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Key material unlocked at login. Lives only in process memory for the
/// lifetime of the session; never persisted. Both keys are wiped on drop.
pub struct SessionKeys {
    pub signing_key: SigningKey,
    pub wrapping_key: Zeroizing<[u8; 32]>,
}

#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub keys: Arc<SessionKeys>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Opaque-token session table. Expiry is checked when a session is read;
/// there is no background sweep.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn create(&self, user_id: Uuid, username: &str, email: &str, keys: SessionKeys) -> Session {
        self.create_expiring_at(user_id, username, email, keys, Utc::now() + self.ttl)
    }

    pub fn create_expiring_at(
        &self,
        user_id: Uuid,
        username: &str,
        email: &str,
        keys: SessionKeys,
        expires_at: DateTime<Utc>,
    ) -> Session {
        let session = Session {
            token: generate_token(),
            user_id,
            username: username.to_string(),
            email: email.to_string(),
            expires_at,
            keys: Arc::new(keys),
        };
        let mut sessions = self.lock();
        // Abandoned sessions are dropped here so their keys do not linger.
        let now = Utc::now();
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Live session for `token`. An expired entry is evicted and reported as absent.
    pub fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.lock();
        let expired = sessions.get(token)?.is_expired(Utc::now());
        if expired {
            sessions.remove(token);
            return None;
        }
        sessions.get(token).cloned()
    }

    /// Push a live session's expiry out by a full TTL. Expired sessions
    /// cannot be refreshed.
    pub fn refresh(&self, token: &str) -> Option<Session> {
        let mut sessions = self.lock();
        let now = Utc::now();
        let session = sessions.get_mut(token)?;
        if session.is_expired(now) {
            sessions.remove(token);
            return None;
        }
        session.expires_at = now + self.ttl;
        Some(session.clone())
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.lock().remove(token)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // Poisoned or not, the map itself is never left half-updated.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
