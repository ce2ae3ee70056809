//! Broadcast router: fan-out of named payloads to broadcast groups.
//!
//! Delivery is fire-and-forget.  A recipient whose transport has gone away
//! is skipped without aborting delivery to the rest of the group; a group
//! with zero members drops the payload entirely (clients re-synchronize
//! via the list operations on reconnect).  Order within one group matches
//! call order because every session drains its own FIFO queue.

use std::sync::Arc;

use serde::Serialize;

use convo_shared::protocol;

use crate::registry::{Session, SessionRegistry};

/// Delivers `{source, data}` envelopes to broadcast groups.
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<SessionRegistry>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Broadcast a payload to every live session in `group`.
    pub fn send<T: Serialize>(&self, group: &str, source: &'static str, data: &T) {
        let frame = match protocol::encode(source, data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(source = source, error = %e, "failed to encode envelope");
                return;
            }
        };

        let members = self.registry.members_of(group);
        if members.is_empty() {
            tracing::trace!(group = %group, source = source, "no live sessions, dropping");
            return;
        }

        for session in &members {
            if !session.push(frame.clone()) {
                tracing::debug!(
                    group = %group,
                    session = %session.id,
                    source = source,
                    "transport gone, skipping recipient"
                );
            }
        }
    }

    /// Point-to-point reply to one session (used by `search` and
    /// `request-list`, whose replies target only the invoking device).
    pub fn send_to<T: Serialize>(&self, session: &Session, source: &'static str, data: &T) {
        let frame = match protocol::encode(source, data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(source = source, error = %e, "failed to encode envelope");
                return;
            }
        };

        if !session.push(frame) {
            tracing::debug!(session = %session.id, source = source, "transport gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(frame: &str) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn delivers_to_every_group_member_and_no_one_else() {
        let registry = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(Arc::clone(&registry));

        let (a1, mut a1_rx) = Session::new();
        let (a2, mut a2_rx) = Session::new();
        let (b, mut b_rx) = Session::new();
        registry.join("alice", a1);
        registry.join("alice", a2);
        registry.join("bob", b);

        router.send("alice", "message-typing", &json!({"username": "bob"}));

        for rx in [&mut a1_rx, &mut a2_rx] {
            let frame = rx.try_recv().unwrap();
            let value = decode(&frame);
            assert_eq!(value["source"], "message-typing");
            assert_eq!(value["data"]["username"], "bob");
        }
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn empty_group_drops_silently() {
        let registry = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(registry);
        // Must not panic or error.
        router.send("nobody-home", "message-typing", &json!({"username": "x"}));
    }

    #[test]
    fn dead_member_does_not_abort_fanout() {
        let registry = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(Arc::clone(&registry));

        let (dead, dead_rx) = Session::new();
        let (live, mut live_rx) = Session::new();
        registry.join("alice", dead);
        registry.join("alice", live);
        drop(dead_rx); // transport gone under the first session

        router.send("alice", "friend-list", &json!([]));

        assert!(live_rx.try_recv().is_ok());
    }

    #[test]
    fn fifo_within_one_group() {
        let registry = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(Arc::clone(&registry));

        let (s, mut rx) = Session::new();
        registry.join("alice", s);

        router.send("alice", "message-send", &json!({"seq": 1}));
        router.send("alice", "message-typing", &json!({"seq": 2}));

        assert_eq!(decode(&rx.try_recv().unwrap())["source"], "message-send");
        assert_eq!(decode(&rx.try_recv().unwrap())["source"], "message-typing");
    }

    #[test]
    fn send_to_targets_single_session() {
        let registry = Arc::new(SessionRegistry::new());
        let router = BroadcastRouter::new(Arc::clone(&registry));

        let (invoking, mut invoking_rx) = Session::new();
        let (other, mut other_rx) = Session::new();
        registry.join("alice", invoking.clone());
        registry.join("alice", other);

        router.send_to(&invoking, "search", &json!([]));

        assert!(invoking_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }
}
