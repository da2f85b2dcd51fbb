//! Session bookkeeping for relay conversations.
//!
//! Each Telegram user maps to one backend conversation, identified by a
//! session id derived from the numeric user id. The store is bounded: least
//! recently used entries are evicted at capacity, and entries expire a fixed
//! TTL after creation (access does not extend the lifetime). Because ids are
//! derived and not random, eviction only drops local bookkeeping; a
//! re-created entry carries the same id and the backend resumes the same
//! conversation.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const SESSION_PREFIX: &str = "tg_";

#[derive(Debug)]
struct SessionEntry {
    session_id: String,
    created_at: Instant,
}

/// Thread-safe, bounded map from Telegram user id to backend session id.
pub struct SessionStore {
    entries: Mutex<LruCache<i64, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions, each valid for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Return the session id for `user_id`, creating an entry if none is live.
    ///
    /// Lookup, expiry check, and insertion happen under a single lock, so
    /// concurrent calls for the same user always observe one entry.
    pub fn get_or_create(&self, user_id: i64) -> String {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get(&user_id) {
            if entry.created_at.elapsed() < self.ttl {
                return entry.session_id.clone();
            }
        }

        let session_id = format!("{SESSION_PREFIX}{user_id}");
        entries.put(
            user_id,
            SessionEntry {
                session_id: session_id.clone(),
                created_at: Instant::now(),
            },
        );
        session_id
    }

    /// Drop every entry past its TTL. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let expired: Vec<i64> = entries
            .iter()
            .filter(|(_, entry)| entry.created_at.elapsed() >= self.ttl)
            .map(|(user_id, _)| *user_id)
            .collect();

        for user_id in &expired {
            entries.pop(user_id);
        }
        expired.len()
    }

    /// Number of tracked sessions.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
