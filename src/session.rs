use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::storage::KeyValueStore;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// `sess_{unix_millis}_{9 base36 chars}`.
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("sess_{}_{}", now.timestamp_millis(), suffix))
    }

    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn storage_key(agent: &str) -> String {
    format!("spiq_session_{agent}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    id: SessionId,
    created_at: DateTime<Utc>,
}

enum Entry {
    Stamped(StoredSession),
    /// Bare id string written without a creation time.
    Legacy(SessionId),
}

fn decode(raw: &str) -> Option<Entry> {
    if let Ok(stored) = serde_json::from_str::<StoredSession>(raw) {
        return Some(Entry::Stamped(stored));
    }
    let trimmed = raw.trim();
    looks_like_id(trimmed).then(|| Entry::Legacy(SessionId(trimmed.to_string())))
}

fn looks_like_id(value: &str) -> bool {
    value.len() > "sess_".len()
        && value.starts_with("sess_")
        && value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// One session id per agent, persisted in a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, ttl: None }
    }

    /// Entries older than `ttl` are replaced on the next lookup.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn get_or_create(&self, agent: &str) -> Result<SessionId, StorageError> {
        self.get_or_create_at(agent, Utc::now()).await
    }

    async fn get_or_create_at(&self, agent: &str, now: DateTime<Utc>) -> Result<SessionId, StorageError> {
        let key = storage_key(agent);
        let settled = match self.store.get(&key).await? {
            None => self.store.set_if_absent(&key, &fresh(now)?.1).await?,
            Some(raw) => match decode(&raw) {
                Some(Entry::Legacy(id)) => return Ok(id),
                Some(Entry::Stamped(stored)) if !self.is_expired(&stored, now) => return Ok(stored.id),
                Some(Entry::Stamped(stored)) => {
                    debug!(agent, expired = %stored.id, "rotating expired session");
                    self.store.compare_and_swap(&key, &raw, &fresh(now)?.1).await?
                }
                None => {
                    debug!(agent, "replacing unreadable session entry");
                    self.store.compare_and_swap(&key, &raw, &fresh(now)?.1).await?
                }
            },
        };
        // whichever writer won, every caller reports the stored id
        match decode(&settled) {
            Some(Entry::Stamped(stored)) => Ok(stored.id),
            Some(Entry::Legacy(id)) => Ok(id),
            None => Err(StorageError::Unreadable(key)),
        }
    }

    /// Replaces the agent's session id unconditionally.
    pub async fn rotate(&self, agent: &str) -> Result<SessionId, StorageError> {
        self.create_at(&storage_key(agent), Utc::now()).await
    }

    pub async fn forget(&self, agent: &str) -> Result<bool, StorageError> {
        self.store.remove(&storage_key(agent)).await
    }

    fn is_expired(&self, stored: &StoredSession, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else { return false };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(stored.created_at) > ttl,
            Err(_) => false,
        }
    }

    async fn create_at(&self, key: &str, now: DateTime<Utc>) -> Result<SessionId, StorageError> {
        let (id, encoded) = fresh(now)?;
        self.store.set(key, &encoded).await?;
        debug!(key, id = %id, "created session");
        Ok(id)
    }
}

fn fresh(now: DateTime<Utc>) -> Result<(SessionId, String), StorageError> {
    let stored = StoredSession { id: SessionId::generate_at(now), created_at: now };
    let encoded = serde_json::to_string(&stored)?;
    Ok((stored.id, encoded))
}
