//! Domain model structs persisted in the SQLite database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user identity.
///
/// Rows are written by the (out-of-scope) registration flow; the realtime
/// core only ever mutates `thumbnail_url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// Unique, stable; doubles as the broadcast group key.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Public URL of the current profile thumbnail, if any.
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display name: "first last", falling back to the username when both
    /// name fields are empty.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Fields required to insert a user (registration flow / test fixtures).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A friendship edge between two users.
///
/// `accepted = false` means pending; `accepted = true` means friends.  An
/// accepted connection is never reverted.  Uniqueness is per *directional*
/// pair `(sender_id, receiver_id)`: a request A->B and a separate request
/// B->A are distinct rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// The endpoint that is not `user_id`.  Callers guarantee `user_id` is
    /// one of the two endpoints.
    pub fn other_party(&self, user_id: i64) -> i64 {
        if self.sender_id == user_id {
            self.receiver_id
        } else {
            self.sender_id
        }
    }
}

/// A pending request joined with its sender identity (for `request-list`).
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub connection: Connection,
    pub sender: User,
}

/// An accepted connection joined with the other party and the latest
/// message, ordered by last activity (for `friend-list`).
#[derive(Debug, Clone)]
pub struct FriendOverview {
    pub connection: Connection,
    pub friend: User,
    /// Content of the most recent message, if any message exists.
    pub preview: Option<String>,
    /// Latest message timestamp, else the connection's `updated_at`.
    pub last_activity: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.  Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub connection_id: i64,
    pub sender_id: i64,
    pub content: String,
    /// Public URL of an image attachment, if any.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: 1,
            username: "alice".into(),
            first_name: first.into(),
            last_name: last.into(),
            email: "alice@example.com".into(),
            thumbnail_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_prefers_real_name() {
        assert_eq!(user("Alice", "Liddell").display_name(), "Alice Liddell");
        assert_eq!(user("Alice", "").display_name(), "Alice");
        assert_eq!(user("", "").display_name(), "alice");
    }

    #[test]
    fn other_party_picks_opposite_endpoint() {
        let conn = Connection {
            id: 1,
            sender_id: 10,
            receiver_id: 20,
            accepted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conn.other_party(10), 20);
        assert_eq!(conn.other_party(20), 10);
    }
}
