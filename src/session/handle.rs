//! Session handle
//!
//! `SessionHandle` is what the registry stores for a session: identity, role,
//! topic and the sending side of the session's outbound channel. It does not
//! own the connection. Once the session's writer task has finished, deliveries
//! through a stale handle fail and are reported to the caller.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::error::SendError;
use uuid::Uuid;

use crate::broker::topic::TopicName;
use crate::session::Role;
use crate::transport::connection::Outbound;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    peer: String,
    role: Role,
    topic: TopicName,
    registered_at: DateTime<Utc>,
    outbound: UnboundedSender<Outbound>,
    closer: Arc<Notify>,
}

impl SessionHandle {
    /// Create a handle with a fresh id. `closer` is the notifier the owning
    /// session watches for an out-of-band close.
    pub fn new(
        peer: impl Into<String>,
        role: Role,
        topic: impl Into<TopicName>,
        outbound: UnboundedSender<Outbound>,
        closer: Arc<Notify>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            peer: peer.into(),
            role,
            topic: topic.into(),
            registered_at: Utc::now(),
            outbound,
            closer,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Remote `address:port`.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Queue one line for the peer. Fails once the connection's writer is gone.
    pub fn deliver(&self, line: Arc<str>) -> Result<(), SendError<Outbound>> {
        self.outbound.send(Outbound::Line(line))
    }

    /// Force the session closed: stop its writer and wake its pending read.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
        self.closer.notify_one();
    }
}
