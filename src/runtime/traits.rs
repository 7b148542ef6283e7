//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::Database;
use crate::state_machine::{PartyId, Session};
use crate::transport::Outbound;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

/// TTL-bounded storage for party sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session for a party; absent and expired records both read as `None`
    async fn get(&self, party_id: PartyId) -> Result<Option<Session>, String>;

    /// Replace the full record and reset its expiry to now + `ttl`
    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), String>;

    /// Drop expired records, returning how many were removed
    async fn purge_expired(&self) -> Result<usize, String>;

    /// Number of unexpired records
    async fn count_live(&self) -> Result<usize, String>;
}

/// Outbound side of the chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one message to a chat (party or operator channel)
    async fn send(&self, chat_id: i64, message: &Outbound) -> Result<(), String>;
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `SessionStore`
///
/// rusqlite is blocking, so every call hops onto the blocking pool.
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<R, F>(&self, op: F) -> Result<R, String>
    where
        F: FnOnce(&Database) -> Result<R, crate::db::DbError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| format!("store task failed: {e}"))?
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl SessionStore for DatabaseStore {
    async fn get(&self, party_id: PartyId) -> Result<Option<Session>, String> {
        self.blocking(move |db| db.get_session(party_id, Utc::now()))
            .await
    }

    async fn put(&self, session: &Session, ttl: Duration) -> Result<(), String> {
        let session = session.clone();
        // Stamped at call time: a write that outlives its timeout must not
        // land on top of the party's next one.
        let now = Utc::now();
        let party_id = session.party_id;
        let stored = self
            .blocking(move |db| db.put_session(&session, ttl, now))
            .await?;
        if stored.is_none() {
            tracing::debug!(party_id = %party_id, "Skipped write older than the stored session");
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, String> {
        self.blocking(|db| db.purge_expired(Utc::now())).await
    }

    async fn count_live(&self) -> Result<usize, String> {
        self.blocking(|db| db.count_live(Utc::now())).await
    }
}
