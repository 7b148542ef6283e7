//! Database module for the session store
//!
//! One row per party, replaced wholesale on every write.

mod schema;

use schema::{SCHEMA, SESSION_COLUMNS};

use crate::state_machine::{DialogState, PartyId, Session};
use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
    #[error("Session TTL out of range: {0:?}")]
    InvalidTtl(Duration),
    #[error("Failed to encode session state: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Live session for a party; expired rows read as absent
    pub fn get_session(&self, party_id: PartyId, now: DateTime<Utc>) -> DbResult<Option<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE party_id = ?1 AND expires_at > ?2"
        ))?;
        let session = stmt
            .query_row(params![party_id.0, now.timestamp_millis()], parse_session_row)
            .optional()?;
        Ok(session)
    }

    /// Write the full record, sliding its expiry to `now + ttl`.
    ///
    /// Returns the record as stored, or `None` when a write stamped with a
    /// later `now` already landed; a late write never overwrites a newer one.
    pub fn put_session(
        &self,
        session: &Session,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DbResult<Option<Session>> {
        let ttl_delta = TimeDelta::from_std(ttl).map_err(|_| DbError::InvalidTtl(ttl))?;
        let expires_at = now
            .checked_add_signed(ttl_delta)
            .ok_or(DbError::InvalidTtl(ttl))?;
        let state_json = serde_json::to_string(&session.state)?;

        let written = self.conn()?.execute(
            "INSERT INTO sessions (party_id, state, city, role, case_type, contact_method,
                 name_or_company, query_text, phone, consultation_active, created_at, expires_at,
                 written_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(party_id) DO UPDATE SET
                 state = excluded.state,
                 city = excluded.city,
                 role = excluded.role,
                 case_type = excluded.case_type,
                 contact_method = excluded.contact_method,
                 name_or_company = excluded.name_or_company,
                 query_text = excluded.query_text,
                 phone = excluded.phone,
                 consultation_active = excluded.consultation_active,
                 created_at = excluded.created_at,
                 expires_at = excluded.expires_at,
                 written_at = excluded.written_at
             WHERE excluded.written_at >= sessions.written_at",
            params![
                session.party_id.0,
                state_json,
                session.city,
                session.role.map(|r| r.as_str()),
                session.case_type.map(|c| c.as_str()),
                session.contact_method.map(|m| m.as_str()),
                session.name_or_company,
                session.query_text,
                session.phone,
                session.consultation_active,
                session.created_at.to_rfc3339(),
                expires_at.timestamp_millis(),
                now.timestamp_millis(),
            ],
        )?;
        if written == 0 {
            return Ok(None);
        }

        let mut stored = session.clone();
        stored.expires_at = expires_at;
        Ok(Some(stored))
    }

    /// Delete rows whose expiry has passed; returns how many went
    pub fn purge_expired(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let removed = self.conn()?.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![now.timestamp_millis()],
        )?;
        Ok(removed)
    }

    pub fn count_live(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sessions WHERE expires_at > ?1",
            params![now.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Parse a session row. Unknown enum values read as unset rather than
/// failing the whole lookup.
fn parse_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let state_json: String = row.get(1)?;
    let state: DialogState = serde_json::from_str(&state_json).unwrap_or_default();
    let parse_enum = |idx: usize| -> rusqlite::Result<Option<String>> { row.get(idx) };

    Ok(Session {
        party_id: PartyId(row.get(0)?),
        state,
        city: row.get(2)?,
        role: parse_enum(3)?.and_then(|s| s.parse().ok()),
        case_type: parse_enum(4)?.and_then(|s| s.parse().ok()),
        contact_method: parse_enum(5)?.and_then(|s| s.parse().ok()),
        name_or_company: row.get(6)?,
        query_text: row.get(7)?,
        phone: row.get(8)?,
        consultation_active: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        expires_at: DateTime::from_timestamp_millis(row.get(11)?).unwrap_or_default(),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
