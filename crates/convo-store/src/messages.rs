//! CRUD operations for [`Message`] records.
//!
//! Messages are immutable once created; history is read newest-first in
//! fixed pages of [`MESSAGE_PAGE_SIZE`](crate::MESSAGE_PAGE_SIZE).

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::models::Message;
use crate::MESSAGE_PAGE_SIZE;

/// One page of history plus the `next` cursor (`0` = no further pages).
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next: u32,
}

impl Database {
    /// Insert a new message into a connection.
    pub fn insert_message(
        &self,
        connection_id: i64,
        sender_id: i64,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO messages (connection_id, sender_id, content, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![connection_id, sender_id, content, image_url, now.to_rfc3339()],
        )?;

        Ok(Message {
            id: self.conn().last_insert_rowid(),
            connection_id,
            sender_id,
            content: content.to_string(),
            image_url: image_url.map(str::to_string),
            created_at: now,
        })
    }

    /// Fetch one zero-based page of a connection's history, newest first.
    ///
    /// `next` is `page + 1` while more rows remain beyond this page and `0`
    /// once exhausted; pages past the end yield an empty list and `next = 0`.
    pub fn messages_page(&self, connection_id: i64, page: u32) -> Result<MessagePage> {
        let offset = i64::from(page) * i64::from(MESSAGE_PAGE_SIZE);

        let mut stmt = self.conn().prepare(
            "SELECT id, connection_id, sender_id, content, image_url, created_at
             FROM messages
             WHERE connection_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(
            params![connection_id, MESSAGE_PAGE_SIZE, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }

        let total = self.count_messages(connection_id)?;
        let consumed = i64::from(page + 1) * i64::from(MESSAGE_PAGE_SIZE);
        let next = if consumed < total { page + 1 } else { 0 };

        Ok(MessagePage { messages, next })
    }

    /// Total number of messages in a connection.
    pub fn count_messages(&self, connection_id: i64) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE connection_id = ?1",
            params![connection_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The most recent message in a connection, if any.
    pub fn latest_message(&self, connection_id: i64) -> Result<Option<Message>> {
        let found = self
            .conn()
            .query_row(
                "SELECT id, connection_id, sender_id, content, image_url, created_at
                 FROM messages
                 WHERE connection_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![connection_id],
                row_to_message,
            )
            .optional()?;
        Ok(found)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts_str: String = row.get(5)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        image_url: row.get(4)?,
        created_at,
    })
}
