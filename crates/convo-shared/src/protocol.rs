use serde::{Deserialize, Serialize};

/// All operations a client may invoke over the persistent transport.
///
/// The JSON representation is an object carrying a `source` tag plus the
/// operation's own fields, e.g.
/// `{"source": "request-connect", "username": "bob"}`.
///
/// Unknown tags or missing fields fail deserialization; the gateway treats
/// that as "ignore, forward compatibility", never as a client-visible error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEnvelope {
    /// Find users by username or real name, annotated with connection status.
    Search { query: String },

    /// Upload a new profile thumbnail (base64-encoded image bytes).
    Thumbnail { base64: String, filename: String },

    /// Send (or re-send, idempotently) a friend request to `username`.
    RequestConnect { username: String },

    /// List pending friend requests addressed to the caller.
    RequestList,

    /// Accept the pending friend request sent by `username`.
    RequestAccept { username: String },

    /// List the caller's accepted connections with conversation previews.
    FriendList,

    /// Send a text message (optionally with an image attachment) into a
    /// connection.  `sender_id` is carried for protocol compatibility but
    /// the authenticated session identity is authoritative.
    MessageSend {
        sender_id: i64,
        connection_id: i64,
        message: String,
        #[serde(default)]
        base64: Option<String>,
        #[serde(default)]
        filename: Option<String>,
    },

    /// Fetch one page of message history for a connection (newest first).
    MessageList { connection_id: i64, page: u32 },

    /// Ephemeral typing indicator relayed to `username`'s devices.
    MessageTyping { username: String },
}

impl ClientEnvelope {
    /// The `source` tag this envelope serializes under.
    pub fn source(&self) -> &'static str {
        match self {
            ClientEnvelope::Search { .. } => "search",
            ClientEnvelope::Thumbnail { .. } => "thumbnail",
            ClientEnvelope::RequestConnect { .. } => "request-connect",
            ClientEnvelope::RequestList => "request-list",
            ClientEnvelope::RequestAccept { .. } => "request-accept",
            ClientEnvelope::FriendList => "friend-list",
            ClientEnvelope::MessageSend { .. } => "message-send",
            ClientEnvelope::MessageList { .. } => "message-list",
            ClientEnvelope::MessageTyping { .. } => "message-typing",
        }
    }
}

/// Outbound envelope: every server-to-client frame is `{source, data}`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope<'a, T: Serialize> {
    pub source: &'static str,
    pub data: &'a T,
}

/// Serialize an outbound envelope to a single JSON text frame.
pub fn encode<T: Serialize>(source: &'static str, data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&ServerEnvelope { source, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_connect() {
        let env: ClientEnvelope =
            serde_json::from_str(r#"{"source": "request-connect", "username": "bob"}"#).unwrap();
        assert_eq!(
            env,
            ClientEnvelope::RequestConnect {
                username: "bob".into()
            }
        );
        assert_eq!(env.source(), "request-connect");
    }

    #[test]
    fn parse_message_send_camel_case_fields() {
        let env: ClientEnvelope = serde_json::from_str(
            r#"{"source": "message-send", "senderId": 1, "connectionId": 7, "message": "hi"}"#,
        )
        .unwrap();
        match env {
            ClientEnvelope::MessageSend {
                sender_id,
                connection_id,
                message,
                base64,
                filename,
            } => {
                assert_eq!(sender_id, 1);
                assert_eq!(connection_id, 7);
                assert_eq!(message, "hi");
                assert!(base64.is_none());
                assert!(filename.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn parse_bare_operations() {
        let env: ClientEnvelope = serde_json::from_str(r#"{"source": "friend-list"}"#).unwrap();
        assert_eq!(env, ClientEnvelope::FriendList);
        let env: ClientEnvelope = serde_json::from_str(r#"{"source": "request-list"}"#).unwrap();
        assert_eq!(env, ClientEnvelope::RequestList);
    }

    #[test]
    fn unknown_source_is_an_error() {
        let result =
            serde_json::from_str::<ClientEnvelope>(r#"{"source": "video-call", "to": "bob"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let result = serde_json::from_str::<ClientEnvelope>(r#"{"source": "search"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn encode_wraps_source_and_data() {
        let frame = encode("message-typing", &serde_json::json!({"username": "alice"})).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["source"], "message-typing");
        assert_eq!(value["data"]["username"], "alice");
    }
}
