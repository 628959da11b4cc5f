//! Registry and broadcaster
//!
//! The registry maps each topic to the sessions registered on it, with one
//! table per role. Publishers are tracked for bookkeeping only; deliveries go
//! to subscribers.
//!
//! Concurrency and usage notes:
//! - One lock guards both tables. `register`, `unregister` and `publish` take
//!   it for their whole duration, so a publish sees a subscriber either fully
//!   registered or not at all.
//! - Delivery is a non-blocking push onto each subscriber's outbound channel,
//!   so no network I/O happens under the lock.
//! - A subscriber whose connection is already gone makes its push fail; that
//!   failure is logged and the broadcast carries on with the others.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::broker::topic::{Topic, TopicName};
use crate::session::{Role, SessionHandle, SessionId};

/// Membership totals across every topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub topics: usize,
    pub publishers: usize,
    pub subscribers: usize,
}

#[derive(Debug, Default)]
struct Tables {
    publishers: HashMap<TopicName, Topic>,
    subscribers: HashMap<TopicName, Topic>,
}

impl Tables {
    fn by_role(&self, role: Role) -> &HashMap<TopicName, Topic> {
        match role {
            Role::Publisher => &self.publishers,
            Role::Subscriber => &self.subscribers,
        }
    }

    fn by_role_mut(&mut self, role: Role) -> &mut HashMap<TopicName, Topic> {
        match role {
            Role::Publisher => &mut self.publishers,
            Role::Subscriber => &mut self.subscribers,
        }
    }

    fn stats(&self) -> RegistryStats {
        let topics: BTreeSet<&TopicName> = self
            .publishers
            .keys()
            .chain(self.subscribers.keys())
            .collect();

        RegistryStats {
            topics: topics.len(),
            publishers: self.publishers.values().map(Topic::len).sum(),
            subscribers: self.subscribers.values().map(Topic::len).sum(),
        }
    }
}

/// Shared topic membership for every session, and the fan-out over it.
#[derive(Debug, Default)]
pub struct Registry {
    tables: Mutex<Tables>,
    prune_empty_topics: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a topic's entry once its last session of a role leaves. Off by
    /// default: topics are otherwise kept forever once created.
    pub fn with_topic_pruning(mut self, prune: bool) -> Self {
        self.prune_empty_topics = prune;
        self
    }

    // Every critical section leaves the tables consistent, so a poisoned lock
    // is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session under its own role and topic, creating the topic on
    /// demand. Registering the same session twice changes nothing.
    pub fn register(&self, session: &SessionHandle) {
        let mut tables = self.lock();
        let topic = tables
            .by_role_mut(session.role())
            .entry(session.topic().to_string())
            .or_insert_with(|| {
                debug!("Topic '{}' not found; creating new.", session.topic());
                Topic::new(session.topic())
            });

        if topic.insert(session.clone()) {
            info!(
                peer = %session.peer(),
                role = %session.role(),
                topic = %session.topic(),
                count = topic.len(),
                "Session registered"
            );
        } else {
            debug!(session = %session.id(), "Session already registered");
        }
    }

    /// Remove a session from the set it belongs to. Returns false, and does
    /// nothing, if it was not registered.
    pub fn unregister(&self, session: &SessionHandle) -> bool {
        let mut tables = self.lock();
        let sets = tables.by_role_mut(session.role());

        let Some(topic) = sets.get_mut(session.topic()) else {
            return false;
        };
        if !topic.remove(session.id()) {
            return false;
        }
        if self.prune_empty_topics && topic.is_empty() {
            if let Some(pruned) = sets.remove(session.topic()) {
                debug!(role = %session.role(), "Pruned empty topic '{}'", pruned.name());
            }
        }

        let stats = tables.stats();
        info!(
            peer = %session.peer(),
            role = %session.role(),
            topic = %session.topic(),
            registered_secs = (Utc::now() - session.registered_at()).num_seconds(),
            remaining_publishers = stats.publishers,
            remaining_subscribers = stats.subscribers,
            "Session unregistered"
        );
        true
    }

    /// Deliver `message` to every subscriber currently registered on `topic`.
    ///
    /// Returns how many subscribers the message was handed to. A failed
    /// delivery is logged and skipped; no subscribers is not an error.
    pub fn publish(
        &self,
        topic: &str,
        message: impl Into<Arc<str>>,
        sender: &SessionId,
    ) -> usize {
        let message: Arc<str> = message.into();
        let tables = self.lock();

        let Some(subscribers) = tables
            .subscribers
            .get(topic)
            .filter(|t| !t.is_empty())
        else {
            debug!(sender = %sender, "No subscribers on topic '{}'", topic);
            return 0;
        };

        info!(
            sender = %sender,
            topic = %topic,
            "Publishing message to {} subscriber(s)",
            subscribers.len()
        );

        let mut delivered = 0;
        for subscriber in subscribers.sessions() {
            match subscriber.deliver(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(
                    peer = %subscriber.peer(),
                    topic = %topic,
                    "Failed to deliver: connection already closed"
                ),
            }
        }
        delivered
    }

    /// Force-close every registered session, publishers and subscribers alike.
    ///
    /// The sessions unregister themselves as they wind down. Returns how many
    /// were signalled.
    pub fn close_all(&self) -> usize {
        let sessions: Vec<SessionHandle> = {
            let tables = self.lock();
            tables
                .publishers
                .values()
                .chain(tables.subscribers.values())
                .flat_map(|topic| topic.sessions().cloned())
                .collect()
        };

        for session in &sessions {
            session.close();
        }
        sessions.len()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        let tables = self.lock();
        tables
            .publishers
            .values()
            .chain(tables.subscribers.values())
            .any(|topic| topic.contains(id))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.count(Role::Subscriber, topic)
    }

    pub fn publisher_count(&self, topic: &str) -> usize {
        self.count(Role::Publisher, topic)
    }

    fn count(&self, role: Role, topic: &str) -> usize {
        self.lock().by_role(role).get(topic).map_or(0, Topic::len)
    }

    /// Every topic with an entry in either table, sorted.
    pub fn topics(&self) -> Vec<TopicName> {
        let tables = self.lock();
        let names: BTreeSet<&TopicName> = tables
            .publishers
            .keys()
            .chain(tables.subscribers.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    pub fn stats(&self) -> RegistryStats {
        self.lock().stats()
    }
}
