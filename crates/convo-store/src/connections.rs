//! CRUD and state-machine operations for [`Connection`] records.
//!
//! The connection lifecycle is deliberately small: a row is created pending
//! by `get_or_create_connection`, flipped exactly once by
//! `accept_connection`, and never deleted or reverted.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use convo_shared::ConnectionStatus;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Connection, FriendOverview, PendingRequest};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Get or create the connection for the *directional* pair
    /// `(sender_id, receiver_id)`.
    ///
    /// Idempotent: an existing row for the exact pair is returned unchanged.
    /// Runs in a transaction, and a lost insert race is resolved by
    /// re-reading the winner's row, so two sessions issuing the same
    /// request concurrently still observe exactly one row.
    pub fn get_or_create_connection(
        &mut self,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<Connection> {
        let tx = self.conn_mut().transaction()?;

        if let Some(existing) = query_pair(&tx, sender_id, receiver_id)? {
            tx.commit()?;
            return Ok(existing);
        }

        let now = Utc::now();
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO connections (sender_id, receiver_id, accepted, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)",
            params![sender_id, receiver_id, now.to_rfc3339()],
        )?;

        let connection = if inserted > 0 {
            Connection {
                id: tx.last_insert_rowid(),
                sender_id,
                receiver_id,
                accepted: false,
                created_at: now,
                updated_at: now,
            }
        } else {
            // Another writer won the unique-index race.
            query_pair(&tx, sender_id, receiver_id)?.ok_or(StoreError::NotFound)?
        };

        tx.commit()?;
        Ok(connection)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single connection by id.
    pub fn get_connection(&self, id: i64) -> Result<Connection> {
        self.conn()
            .query_row(
                "SELECT id, sender_id, receiver_id, accepted, created_at, updated_at
                 FROM connections WHERE id = ?1",
                params![id],
                row_to_connection,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a connection together with both endpoint users.
    pub fn get_connection_with_parties(
        &self,
        id: i64,
    ) -> Result<(Connection, crate::models::User, crate::models::User)> {
        let connection = self.get_connection(id)?;
        let sender = self.get_user(connection.sender_id)?;
        let receiver = self.get_user(connection.receiver_id)?;
        Ok((connection, sender, receiver))
    }

    /// The pending connection for the exact directional pair, if any.
    pub fn find_pending(&self, sender_id: i64, receiver_id: i64) -> Result<Option<Connection>> {
        let found = self
            .conn()
            .query_row(
                "SELECT id, sender_id, receiver_id, accepted, created_at, updated_at
                 FROM connections
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND accepted = 0",
                params![sender_id, receiver_id],
                row_to_connection,
            )
            .optional()?;
        Ok(found)
    }

    /// All pending requests addressed to `receiver_id`, newest first, each
    /// joined with the sender identity.
    pub fn pending_requests_for(&self, receiver_id: i64) -> Result<Vec<PendingRequest>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.sender_id, c.receiver_id, c.accepted, c.created_at, c.updated_at,
                    u.id, u.username, u.first_name, u.last_name, u.email, u.thumbnail_url, u.created_at
             FROM connections c
             JOIN users u ON u.id = c.sender_id
             WHERE c.receiver_id = ?1 AND c.accepted = 0
             ORDER BY c.created_at DESC, c.id DESC",
        )?;

        let rows = stmt.query_map(params![receiver_id], |row| {
            Ok(PendingRequest {
                connection: row_to_connection(row)?,
                sender: joined_user(row)?,
            })
        })?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// All accepted connections involving `user_id`, each joined with the
    /// other party and the latest message, ordered by last activity
    /// descending (connections without messages sort by acceptance time).
    pub fn accepted_connections_for(&self, user_id: i64) -> Result<Vec<FriendOverview>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.sender_id, c.receiver_id, c.accepted, c.created_at, c.updated_at,
                    u.id, u.username, u.first_name, u.last_name, u.email, u.thumbnail_url, u.created_at,
                    m.content, m.created_at
             FROM connections c
             JOIN users u
               ON u.id = CASE WHEN c.sender_id = ?1 THEN c.receiver_id ELSE c.sender_id END
             LEFT JOIN messages m ON m.id = (
                 SELECT id FROM messages
                 WHERE connection_id = c.id
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1)
             WHERE c.accepted = 1 AND (c.sender_id = ?1 OR c.receiver_id = ?1)
             ORDER BY COALESCE(m.created_at, c.updated_at) DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            let connection = row_to_connection(row)?;
            let friend = joined_user(row)?;
            let preview: Option<String> = row.get(13)?;
            let preview_ts: Option<String> = row.get(14)?;
            Ok((connection, friend, preview, preview_ts))
        })?;

        let mut overviews = Vec::new();
        for row in rows {
            let (connection, friend, preview, preview_ts) = row?;
            let last_activity = match preview_ts {
                Some(ts) => parse_ts(&ts)?,
                None => connection.updated_at,
            };
            overviews.push(FriendOverview {
                connection,
                friend,
                preview,
                last_activity,
            });
        }
        Ok(overviews)
    }

    /// Derive the caller-relative status for a search candidate.
    ///
    /// Precedence: `PendingThem` > `PendingMe` > `Connected` >
    /// `NotConnected`.  The directional get-or-create means at most two
    /// rows can exist per pair, so the precedence is evaluated over all of
    /// them.
    pub fn connection_status(&self, caller_id: i64, other_id: i64) -> Result<ConnectionStatus> {
        let mut stmt = self.conn().prepare(
            "SELECT sender_id, accepted FROM connections
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)",
        )?;

        let rows = stmt.query_map(params![caller_id, other_id], |row| {
            let sender_id: i64 = row.get(0)?;
            let accepted: bool = row.get(1)?;
            Ok((sender_id, accepted))
        })?;

        let mut status = ConnectionStatus::NotConnected;
        for row in rows {
            let (sender_id, accepted) = row?;
            let candidate = if !accepted && sender_id == other_id {
                ConnectionStatus::PendingThem
            } else if !accepted && sender_id == caller_id {
                ConnectionStatus::PendingMe
            } else {
                ConnectionStatus::Connected
            };
            if rank(candidate) < rank(status) {
                status = candidate;
            }
        }
        Ok(status)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Flip a pending connection to accepted.
    ///
    /// Returns `true` when this call performed the flip and `false` when the
    /// row was already accepted, so a racing double-accept cannot fire
    /// follow-up events twice.  An unknown id is [`StoreError::NotFound`].
    pub fn accept_connection(&self, id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = self.conn().execute(
            "UPDATE connections SET accepted = 1, updated_at = ?2
             WHERE id = ?1 AND accepted = 0",
            params![id, now.to_rfc3339()],
        )?;

        if affected == 0 {
            // Distinguish "already accepted" from "no such row".
            self.get_connection(id)?;
            return Ok(false);
        }
        Ok(true)
    }
}

fn rank(status: ConnectionStatus) -> u8 {
    match status {
        ConnectionStatus::PendingThem => 0,
        ConnectionStatus::PendingMe => 1,
        ConnectionStatus::Connected => 2,
        ConnectionStatus::NotConnected => 3,
    }
}

fn query_pair(
    conn: &rusqlite::Connection,
    sender_id: i64,
    receiver_id: i64,
) -> Result<Option<Connection>> {
    let found = conn
        .query_row(
            "SELECT id, sender_id, receiver_id, accepted, created_at, updated_at
             FROM connections WHERE sender_id = ?1 AND receiver_id = ?2",
            params![sender_id, receiver_id],
            row_to_connection,
        )
        .optional()?;
    Ok(found)
}

fn parse_ts(ts: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(ts)?.with_timezone(&Utc))
}

pub(crate) fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Connection> {
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Connection {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        accepted: row.get(3)?,
        created_at,
        updated_at,
    })
}

/// Read the joined user columns (indices 6..=12 in the queries above).
fn joined_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<crate::models::User> {
    let ts_str: String = row.get(12)?;
    let created_at = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(crate::models::User {
        id: row.get(6)?,
        username: row.get(7)?,
        first_name: row.get(8)?,
        last_name: row.get(9)?,
        email: row.get(10)?,
        thumbnail_url: row.get(11)?,
        created_at,
    })
}
