//! Pure payload rendering.
//!
//! Several outbound payloads are viewer-relative (the `friend` side of a
//! connection, the `is_my_message` flag), so the engines call these once
//! per recipient group instead of broadcasting one shared shape.  Keeping
//! the functions pure makes that protocol invariant testable in isolation.

use convo_shared::types::{
    ConnectionPayload, ConnectionStatus, FriendPayload, MessageEventPayload, MessageListPayload,
    MessagePayload, SearchResultPayload, UserPayload,
};
use convo_store::messages::MessagePage;
use convo_store::{Connection, FriendOverview, Message, User};

/// Preview text for a friendship without any messages yet.
pub const EMPTY_PREVIEW: &str = "Say hi!";

pub fn user(user: &User) -> UserPayload {
    UserPayload {
        id: user.id,
        username: user.username.clone(),
        name: user.display_name(),
        thumbnail: user.thumbnail_url.clone(),
    }
}

pub fn search_result(candidate: &User, status: ConnectionStatus) -> SearchResultPayload {
    SearchResultPayload {
        id: candidate.id,
        username: candidate.username.clone(),
        name: candidate.display_name(),
        thumbnail: candidate.thumbnail_url.clone(),
        status,
    }
}

pub fn connection(conn: &Connection, sender: &User, receiver: &User) -> ConnectionPayload {
    ConnectionPayload {
        id: conn.id,
        sender: user(sender),
        receiver: user(receiver),
        accepted: conn.accepted,
        created_at: conn.created_at,
    }
}

/// Friend entry for an existing conversation (used by `friend-list`).
pub fn friend_overview(overview: &FriendOverview) -> FriendPayload {
    FriendPayload {
        id: overview.connection.id,
        friend: user(&overview.friend),
        preview: overview
            .preview
            .clone()
            .unwrap_or_else(|| EMPTY_PREVIEW.to_string()),
        updated_at: overview.last_activity,
    }
}

/// Friend entry for a just-accepted connection (used by `friend-new`),
/// rendered relative to one recipient: `friend` is the *other* party.
pub fn new_friend(conn: &Connection, friend: &User) -> FriendPayload {
    FriendPayload {
        id: conn.id,
        friend: user(friend),
        preview: EMPTY_PREVIEW.to_string(),
        updated_at: conn.updated_at,
    }
}

/// A message rendered relative to one viewer.
pub fn message_for(message: &Message, viewer_id: i64) -> MessagePayload {
    MessagePayload {
        id: message.id,
        content: message.content.clone(),
        image_url: message.image_url.clone(),
        created_at: message.created_at,
        is_my_message: message.sender_id == viewer_id,
    }
}

/// `message-send` event rendered relative to one recipient: the ownership
/// flag tracks the viewer and `friend` is the conversation partner from the
/// viewer's point of view.
pub fn message_event(message: &Message, viewer: &User, partner: &User) -> MessageEventPayload {
    MessageEventPayload {
        connection_id: message.connection_id,
        message: message_for(message, viewer.id),
        friend: user(partner),
    }
}

/// One page of history rendered relative to the caller.
pub fn message_page(connection_id: i64, page: &MessagePage, viewer: &User) -> MessageListPayload {
    MessageListPayload {
        connection_id,
        messages: page
            .messages
            .iter()
            .map(|m| message_for(m, viewer.id))
            .collect(),
        next: page.next,
        me: user(viewer),
    }
}
