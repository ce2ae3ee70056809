//! Session registry: live transport sessions grouped by broadcast key.
//!
//! The group key is the target user's *username*, so an identity with
//! several devices contributes several sessions to one group, and a
//! reconnecting session rejoins the right audience without any directory
//! lookup.  Membership is derived state only; nothing here is persisted.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier for one live transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live session: an id plus the handle of its outbound frame queue.
///
/// The queue is drained by the session's writer task, so frames pushed in
/// order are delivered in order (FIFO per recipient).
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    tx: mpsc::UnboundedSender<String>,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: SessionId::new(),
                tx,
            },
            rx,
        )
    }

    /// Queue one outbound frame.  Returns `false` when the transport
    /// underneath has already gone away; callers treat that as
    /// fire-and-forget and move on.
    pub fn push(&self, frame: String) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Maps group key (username) to the set of live sessions subscribed under it.
///
/// Safe for concurrent join/leave/members-of from arbitrarily many session
/// tasks.  `members_of` returns a consistent snapshot; it need not be
/// linearizable with concurrent joins.
pub struct SessionRegistry {
    groups: DashMap<String, Vec<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Subscribe a session under a group key.
    pub fn join(&self, group: &str, session: Session) {
        tracing::debug!(group = %group, session = %session.id, "session joined group");
        self.groups.entry(group.to_string()).or_default().push(session);
    }

    /// Remove a session from a group.  Idempotent: leaving an already-absent
    /// session is a no-op, so disconnect races never propagate.
    pub fn leave(&self, group: &str, id: SessionId) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.retain(|s| s.id != id);
        }
        // Drop empty groups so the map does not grow without bound.
        self.groups.remove_if(group, |_, members| members.is_empty());
        tracing::debug!(group = %group, session = %id, "session left group");
    }

    /// Snapshot of the sessions currently subscribed under a group key.
    pub fn members_of(&self, group: &str) -> Vec<Session> {
        self.groups
            .get(group)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Number of groups with at least one member.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of sessions in one group.
    pub fn member_count(&self, group: &str) -> usize {
        self.groups.get(group).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
