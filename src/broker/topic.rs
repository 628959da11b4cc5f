//! Topic membership
//!
//! A `Topic` holds the sessions of one role registered under one topic name.
//! The registry keeps two maps of these, one per role. Duplicate inserts are
//! a no-op.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the registry
//! lock does this).

use std::collections::HashMap;

use crate::session::{SessionHandle, SessionId};

/// Alias for a topic name. Case-sensitive, never normalized.
pub type TopicName = String;

/// The single implicit topic used when topics are disabled.
pub const DEFAULT_TOPIC: &str = "";

#[derive(Debug, Default)]
pub struct Topic {
    name: TopicName,
    sessions: HashMap<SessionId, SessionHandle>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sessions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a session. Returns false if it was already present.
    pub fn insert(&mut self, session: SessionHandle) -> bool {
        if self.sessions.contains_key(session.id()) {
            return false;
        }
        self.sessions.insert(session.id().clone(), session);
        true
    }

    /// Remove a session. Returns false if it was not present.
    pub fn remove(&mut self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionHandle> {
        self.sessions.values()
    }
}
