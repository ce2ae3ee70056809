//! Payload shapes the server renders for clients.
//!
//! Several of these are *viewer-relative*: the same underlying entity is
//! rendered once per recipient group (`is_my_message`, the `friend` side of
//! a connection), so none of them are a straight dump of a storage row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relationship between the caller and a search candidate, derived from the
/// connections table.  Precedence when deriving: `PendingThem` >
/// `PendingMe` > `Connected` > `NotConnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    /// The candidate sent the caller a request that is still pending.
    PendingThem,
    /// The caller sent the candidate a request that is still pending.
    PendingMe,
    /// An accepted connection exists between the two (either direction).
    Connected,
    /// No connection row exists between the two.
    NotConnected,
}

/// A user identity as rendered for clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub id: i64,
    pub username: String,
    /// Display name: "first last", falling back to the username.
    pub name: String,
    pub thumbnail: Option<String>,
}

/// One row of a `search` reply: a user plus the caller-relative status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultPayload {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub thumbnail: Option<String>,
    pub status: ConnectionStatus,
}

/// A connection edge with both endpoints, used by `request-connect`,
/// `request-list`, and `request-accept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPayload {
    pub id: i64,
    pub sender: UserPayload,
    pub receiver: UserPayload,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

/// One friend entry: the connection rendered relative to a viewer, with the
/// other party surfaced as `friend` and the conversation preview attached.
/// Used by `friend-list` and `friend-new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendPayload {
    /// Connection id (the conversation handle used by `message-*` ops).
    pub id: i64,
    pub friend: UserPayload,
    /// Latest message content, or a fixed placeholder for a fresh friendship.
    pub preview: String,
    /// Last-activity timestamp: latest message time, else acceptance time.
    pub updated_at: DateTime<Utc>,
}

/// A single message rendered relative to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Whether the viewer this payload was rendered for sent the message.
    pub is_my_message: bool,
}

/// `message-send` event: the new message plus the conversation partner from
/// the recipient's point of view (lets clients refresh the friend preview).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEventPayload {
    pub connection_id: i64,
    pub message: MessagePayload,
    pub friend: UserPayload,
}

/// `message-list` reply: one page of history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListPayload {
    pub connection_id: i64,
    pub messages: Vec<MessagePayload>,
    /// Next page number, or `0` when this was the last page.
    pub next: u32,
    /// The caller's own identity, bundled for client convenience.
    pub me: UserPayload,
}

/// `message-typing` relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub username: String,
}
