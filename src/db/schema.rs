//! Database schema

/// SQL schema for initialization
///
/// `expires_at` and `written_at` are unix milliseconds so expiry checks stay
/// a plain integer comparison; enum columns hold their snake_case names.
/// `written_at` orders writes for the same party.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    party_id INTEGER PRIMARY KEY,
    state TEXT NOT NULL DEFAULT '{"type":"idle"}',
    city TEXT,
    role TEXT,
    case_type TEXT,
    contact_method TEXT,
    name_or_company TEXT,
    query_text TEXT,
    phone TEXT,
    consultation_active BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    written_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
"#;

/// Column list shared by every session SELECT, in `parse_session_row` order
pub const SESSION_COLUMNS: &str = "party_id, state, city, role, case_type, contact_method, \
     name_or_company, query_text, phone, consultation_active, created_at, expires_at";
