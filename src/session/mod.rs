//! Session module - durable, TTL-bounded conversation persistence
//!
//! This module provides the session-state lifecycle contract:
//! - `Conversation` and its message types
//! - `SessionStore`: whole-object persistence keyed by session id, with a
//!   TTL refreshed on every save
//!
//! The store is deliberately forgiving: `load` never fails. An absent key,
//! an expired entry, or an unreachable backing store all yield a fresh empty
//! `Conversation`, so the orchestrator stays available at the cost of losing
//! history on storage failure.
//!
//! # Example
//!
//! ```
//! use zeolith::session::{Conversation, Message, SessionStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SessionStore::new_memory();
//!
//!     let mut conversation = store.load("session-1").await;
//!     conversation.push(Message::user("Hello!"));
//!     store.save("session-1", &conversation).await;
//!
//!     let reloaded = store.load("session-1").await;
//!     assert_eq!(reloaded.messages.len(), 1);
//! }
//! ```

pub mod types;

pub use types::{Conversation, Message, Role, ToolCall};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default session lifetime: 24 hours, refreshed on every save.
pub const DEFAULT_TTL_SECS: i64 = 86_400;

/// Persistence envelope: the conversation plus the timestamp of the last
/// save, from which expiry is computed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    saved_at: DateTime<Utc>,
    conversation: Conversation,
}

/// Durable, TTL-bounded key-value persistence of conversations.
///
/// Updates are whole-object: every `save` replaces the stored conversation
/// outright, with no partial or merge semantics. Two concurrent writers on
/// the same key therefore race with last-write-wins semantics; callers that
/// need stronger guarantees must serialize externally (the orchestrator does
/// this with a per-session lock).
///
/// # Backends
///
/// With `new()`/`with_path()` sessions are written as JSON files under a
/// storage directory, fronted by an in-memory cache. `new_memory()` keeps
/// everything in memory, for tests or ephemeral deployments.
pub struct SessionStore {
    /// In-memory cache of sessions
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    /// Optional directory for file-based persistence
    storage_path: Option<PathBuf>,
    /// Session lifetime; entries older than this are treated as absent and
    /// reclaimed when a load or existence check observes them
    ttl: Duration,
}

impl SessionStore {
    /// Create a store persisting to `~/.zeolith/sessions/` with the default
    /// 24-hour TTL.
    ///
    /// # Errors
    /// Returns an error if the sessions directory cannot be created.
    pub fn new() -> crate::error::Result<Self> {
        let storage_path = crate::config::Config::dir().join("sessions");
        Self::with_path(storage_path)
    }

    /// Create a store persisting to a custom directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn with_path(path: PathBuf) -> crate::error::Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(path),
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
        })
    }

    /// Create an in-memory store without file persistence.
    pub fn new_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: None,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
        }
    }

    /// Override the session TTL.
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl = Duration::seconds(ttl_secs);
        self
    }

    /// Load the conversation for a session id.
    ///
    /// Never fails: an absent key, an expired entry, a corrupt file, or an
    /// unreachable storage directory all yield a fresh empty `Conversation`.
    /// Failures are logged, not raised.
    pub async fn load(&self, session_id: &str) -> Conversation {
        // In-memory cache first; expired entries are reclaimed, not just
        // skipped, so a long-lived store does not accumulate dead sessions
        let mut cache_expired = false;
        {
            let sessions = self.sessions.read().await;
            if let Some(stored) = sessions.get(session_id) {
                if self.is_expired(stored) {
                    cache_expired = true;
                } else {
                    return stored.conversation.clone();
                }
            }
        }
        if cache_expired {
            debug!(session_id, "Session expired, evicting and starting fresh");
            self.evict(session_id).await;
            return Conversation::new();
        }

        // Fall back to disk if persistence is enabled
        if let Some(ref storage_path) = self.storage_path {
            let file_path = storage_path.join(format!("{}.json", Self::sanitize_key(session_id)));
            match tokio::fs::read_to_string(&file_path).await {
                Ok(content) => match serde_json::from_str::<StoredSession>(&content) {
                    Ok(stored) if !self.is_expired(&stored) => {
                        let mut sessions = self.sessions.write().await;
                        sessions.insert(session_id.to_string(), stored.clone());
                        return stored.conversation;
                    }
                    Ok(_) => {
                        debug!(session_id, "Session expired, evicting and starting fresh");
                        self.evict(session_id).await;
                    }
                    Err(e) => {
                        warn!(session_id, error = %e, "Corrupt session file, starting fresh");
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(session_id, error = %e, "Session store unreachable, starting fresh");
                }
            }
        }

        Conversation::new()
    }

    /// Persist the conversation for a session id, refreshing its TTL.
    ///
    /// The write is whole-object. Disk failures are logged and swallowed so
    /// a degraded store never fails a request; the in-memory cache always
    /// reflects the latest save.
    pub async fn save(&self, session_id: &str, conversation: &Conversation) {
        let stored = StoredSession {
            saved_at: Utc::now(),
            conversation: conversation.clone(),
        };

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(session_id.to_string(), stored.clone());
        }

        if let Some(ref storage_path) = self.storage_path {
            let file_path = storage_path.join(format!("{}.json", Self::sanitize_key(session_id)));
            let result = match serde_json::to_string_pretty(&stored) {
                Ok(content) => tokio::fs::write(&file_path, content).await,
                Err(e) => {
                    warn!(session_id, error = %e, "Failed to serialize session");
                    return;
                }
            };
            if let Err(e) = result {
                warn!(session_id, error = %e, "Failed to persist session to disk");
            } else {
                debug!(session_id, messages = conversation.message_count(), "Session saved");
            }
        }
    }

    /// Check whether a session exists and has not expired. Expired entries
    /// observed here are reclaimed.
    pub async fn exists(&self, session_id: &str) -> bool {
        let mut cache_expired = false;
        {
            let sessions = self.sessions.read().await;
            if let Some(stored) = sessions.get(session_id) {
                if self.is_expired(stored) {
                    cache_expired = true;
                } else {
                    return true;
                }
            }
        }
        if cache_expired {
            self.evict(session_id).await;
            return false;
        }

        if let Some(ref storage_path) = self.storage_path {
            let file_path = storage_path.join(format!("{}.json", Self::sanitize_key(session_id)));
            if let Ok(content) = tokio::fs::read_to_string(&file_path).await {
                if let Ok(stored) = serde_json::from_str::<StoredSession>(&content) {
                    if self.is_expired(&stored) {
                        self.evict(session_id).await;
                        return false;
                    }
                    return true;
                }
            }
        }

        false
    }

    /// Remove a session from the cache and, when persistence is enabled,
    /// delete its file on disk.
    async fn evict(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);

        if let Some(ref storage_path) = self.storage_path {
            let file_path = storage_path.join(format!("{}.json", Self::sanitize_key(session_id)));
            if let Err(e) = tokio::fs::remove_file(&file_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(session_id, error = %e, "Failed to remove expired session file");
                }
            }
        }
    }

    /// Drop all in-memory cached sessions (does not touch disk).
    pub async fn clear_cache(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
    }

    fn is_expired(&self, stored: &StoredSession) -> bool {
        Utc::now() - stored.saved_at > self.ttl
    }

    /// Sanitize a session id for use as a filename.
    ///
    /// Percent-encodes filesystem-hostile characters so the mapping is
    /// bijective: distinct ids never collide on the same file.
    fn sanitize_key(key: &str) -> String {
        let mut result = String::with_capacity(key.len() * 3);
        for c in key.chars() {
            match c {
                '/' => result.push_str("%2F"),
                '\\' => result.push_str("%5C"),
                ':' => result.push_str("%3A"),
                '*' => result.push_str("%2A"),
                '?' => result.push_str("%3F"),
                '"' => result.push_str("%22"),
                '<' => result.push_str("%3C"),
                '>' => result.push_str("%3E"),
                '|' => result.push_str("%7C"),
                '%' => result.push_str("%25"),
                c => result.push(c),
            }
        }
        result
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            storage_path: self.storage_path.clone(),
            ttl: self.ttl,
        }
    }
}

impl Default for SessionStore {
    /// Creates an in-memory store. Use `SessionStore::new()` for persistence.
    fn default() -> Self {
        Self::new_memory()
    }
}
