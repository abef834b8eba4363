//! SQLite schema definition
//!
//! - users, devices, library_items: mutable reference data, upserted by id
//! - listening_sessions: append-only history, one row per remote session
//!
//! Foreign keys are declared for readers but not enforced (PRAGMA foreign_keys
//! stays off): a session may point at reference rows from a failed record.

pub const SCHEMA: &str = r#"
-- ============================================
-- REFERENCE DATA
-- ============================================

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY CHECK (length(id) <= 255),
    username TEXT CHECK (length(username) <= 255)
);

-- Devices are keyed by the server-assigned device id
CREATE TABLE IF NOT EXISTS devices (
    id TEXT PRIMARY KEY CHECK (length(id) <= 255),
    client_name TEXT CHECK (length(client_name) <= 255),
    device_name TEXT CHECK (length(device_name) <= 255),
    model TEXT CHECK (length(model) <= 255),
    manufacturer TEXT CHECK (length(manufacturer) <= 255),
    client_version TEXT CHECK (length(client_version) <= 255)
);

CREATE TABLE IF NOT EXISTS library_items (
    id TEXT PRIMARY KEY CHECK (length(id) <= 255),
    library_id TEXT CHECK (length(library_id) <= 255),
    media_type TEXT CHECK (length(media_type) <= 255),
    title TEXT CHECK (length(title) <= 1024),
    subtitle TEXT CHECK (length(subtitle) <= 1024),
    author TEXT CHECK (length(author) <= 1024),
    narrators TEXT,                        -- JSON array of names
    description TEXT,
    genres TEXT,                           -- JSON array of genres
    release_date TEXT,
    published_year TEXT,
    feed_url TEXT,
    image_url TEXT,
    explicit BOOLEAN,
    language TEXT,
    publisher TEXT,
    isbn TEXT,
    asin TEXT
);

-- ============================================
-- LISTENING HISTORY
-- ============================================

-- Rows are never updated; an existing id marks already-synced history
CREATE TABLE IF NOT EXISTS listening_sessions (
    id TEXT PRIMARY KEY CHECK (length(id) <= 255),
    user_id TEXT,
    library_item_id TEXT,
    episode_id TEXT,
    device_id TEXT,
    display_title TEXT CHECK (length(display_title) <= 1024),
    display_author TEXT CHECK (length(display_author) <= 1024),
    duration REAL,                         -- seconds
    time_listening REAL,
    start_offset REAL,
    media_progress REAL,
    started_at DATETIME,                   -- RFC 3339 UTC, millisecond precision
    updated_at DATETIME,
    date_log TEXT,                         -- server-local day, YYYY-MM-DD
    day_of_week TEXT,
    FOREIGN KEY(user_id) REFERENCES users(id),
    FOREIGN KEY(library_item_id) REFERENCES library_items(id),
    FOREIGN KEY(device_id) REFERENCES devices(id)
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_sessions_started ON listening_sessions(started_at);
CREATE INDEX IF NOT EXISTS idx_sessions_item ON listening_sessions(library_item_id);
"#;
