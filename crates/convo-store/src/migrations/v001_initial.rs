//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `connections`, `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT '',
    email         TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL DEFAULT '',     -- written by the registration flow
    thumbnail_url TEXT,
    created_at    TEXT NOT NULL                 -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Connections (friend requests / friendships)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS connections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id   INTEGER NOT NULL,               -- FK -> users(id)
    receiver_id INTEGER NOT NULL,               -- FK -> users(id)
    accepted    INTEGER NOT NULL DEFAULT 0,     -- boolean 0/1
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (receiver_id) REFERENCES users(id) ON DELETE CASCADE
);

-- One row per directional pair; A->B and B->A stay distinct.
CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_pair
    ON connections(sender_id, receiver_id);

CREATE INDEX IF NOT EXISTS idx_connections_receiver
    ON connections(receiver_id, accepted);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    connection_id INTEGER NOT NULL,             -- FK -> connections(id)
    sender_id     INTEGER NOT NULL,             -- FK -> users(id)
    content       TEXT NOT NULL,
    image_url     TEXT,
    created_at    TEXT NOT NULL,

    FOREIGN KEY (connection_id) REFERENCES connections(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_connection_ts
    ON messages(connection_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
