//! Per-connection state machine
//!
//! A `Session` reads the handshake (role, then topic when topics are enabled),
//! acknowledges it, registers with the `Registry` and then loops over incoming
//! lines until `terminate`, end-of-stream, an I/O error or a forced close.
//!
//! Unregistration is tied to a guard value rather than to the exit path, so a
//! session leaves the registry exactly once whichever way its loop ends.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::broker::message::Delivery;
use crate::broker::topic::{DEFAULT_TOPIC, TopicName};
use crate::broker::Registry;
use crate::config::RelaySettings;
use crate::session::{Role, SessionHandle};
use crate::transport::connection::LineConnection;

/// Sent to a peer whose first line is not a valid role.
pub const INVALID_ROLE_NOTICE: &str = "Invalid role. Use PUBLISHER or SUBSCRIBER";

/// Line (case-insensitive) a peer sends to end its session.
pub const TERMINATE: &str = "terminate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingRole,
    /// Only entered when topics are enabled.
    AwaitingTopic,
    Registered,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// End-of-stream from the peer.
    PeerClosed,
    /// The peer sent `terminate`.
    Terminated,
    /// The first line was not a valid role.
    InvalidRole,
    /// Closed out-of-band, e.g. by server shutdown.
    Shutdown,
    /// Reading failed; handled like end-of-stream.
    Io,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::PeerClosed => "peer closed the connection",
            CloseReason::Terminated => "terminate received",
            CloseReason::InvalidRole => "invalid role",
            CloseReason::Shutdown => "closed by server",
            CloseReason::Io => "i/o error",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub topics_enabled: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            topics_enabled: true,
        }
    }
}

impl From<&RelaySettings> for SessionOptions {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            topics_enabled: settings.topics_enabled,
        }
    }
}

pub struct Session<S> {
    conn: LineConnection<S>,
    registry: Arc<Registry>,
    options: SessionOptions,
    state: SessionState,
    closer: Arc<Notify>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        registry: Arc<Registry>,
        options: SessionOptions,
    ) -> Self {
        Self {
            conn: LineConnection::new(stream, peer),
            registry,
            options,
            state: SessionState::AwaitingRole,
            closer: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to completion and release its connection.
    pub async fn run(mut self) -> CloseReason {
        let reason = self.drive().await;
        self.state = SessionState::Closed;

        let peer = self.conn.peer().to_string();
        self.conn.close().await;

        match reason {
            CloseReason::InvalidRole => warn!(peer = %peer, "Session rejected: {reason}"),
            CloseReason::Io => warn!(peer = %peer, "Session closed: {reason}"),
            _ => info!(peer = %peer, "Session closed: {reason}"),
        }
        reason
    }

    async fn drive(&mut self) -> CloseReason {
        let role = match self.await_role().await {
            Ok(role) => role,
            Err(reason) => return reason,
        };

        let topic = if self.options.topics_enabled {
            match self.await_topic().await {
                Ok(topic) => topic,
                Err(reason) => return reason,
            }
        } else {
            DEFAULT_TOPIC.to_string()
        };

        self.state = SessionState::Registered;
        let handle = SessionHandle::new(
            self.conn.peer(),
            role,
            topic,
            self.conn.outbound(),
            Arc::clone(&self.closer),
        );

        self.conn
            .send_line(acknowledgment(&handle, self.options.topics_enabled));
        let _registration = Registration::new(Arc::clone(&self.registry), handle.clone());

        self.read_loop(&handle).await
    }

    async fn await_role(&mut self) -> Result<Role, CloseReason> {
        self.state = SessionState::AwaitingRole;
        let line = self.next_line().await.map_err(|reason| {
            if reason == CloseReason::PeerClosed {
                info!(peer = %self.conn.peer(), "Client disconnected before sending role");
            }
            reason
        })?;

        line.parse::<Role>().map_err(|e| {
            warn!(peer = %self.conn.peer(), "{e}");
            self.conn.send_line(INVALID_ROLE_NOTICE);
            CloseReason::InvalidRole
        })
    }

    async fn await_topic(&mut self) -> Result<TopicName, CloseReason> {
        self.state = SessionState::AwaitingTopic;
        let line = self.next_line().await.map_err(|reason| {
            if reason == CloseReason::PeerClosed {
                info!(peer = %self.conn.peer(), "Client disconnected before sending topic");
            }
            reason
        })?;

        // Topic names are case-sensitive; only surrounding whitespace goes.
        Ok(line.trim().to_string())
    }

    async fn read_loop(&mut self, handle: &SessionHandle) -> CloseReason {
        loop {
            let line = match self.next_line().await {
                Ok(line) => line,
                Err(reason) => return reason,
            };

            if line.trim().eq_ignore_ascii_case(TERMINATE) {
                info!(
                    peer = %handle.peer(),
                    role = %handle.role(),
                    topic = %handle.topic(),
                    "Client requested termination"
                );
                return CloseReason::Terminated;
            }

            match handle.role() {
                Role::Publisher => {
                    let delivery = Delivery::new(handle.peer(), line);
                    debug!(
                        peer = %handle.peer(),
                        topic = %handle.topic(),
                        published_at = %delivery.published_at.to_rfc3339(),
                        "Received: {}",
                        delivery.payload
                    );
                    self.registry
                        .publish(handle.topic(), delivery.render(), handle.id());
                }
                Role::Subscriber => {
                    debug!(peer = %handle.peer(), "Ignoring line from subscriber");
                }
            }
        }
    }

    /// Next line from the peer, or the reason the stream is over.
    async fn next_line(&mut self) -> Result<String, CloseReason> {
        let closer = Arc::clone(&self.closer);
        let line = tokio::select! {
            _ = closer.notified() => return Err(CloseReason::Shutdown),
            line = self.conn.read_line() => line,
        };

        match line {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(CloseReason::PeerClosed),
            Err(e) => {
                debug!(peer = %self.conn.peer(), "Read failed: {e}");
                Err(CloseReason::Io)
            }
        }
    }
}

/// Text of the line confirming a completed handshake.
pub fn acknowledgment(handle: &SessionHandle, topics_enabled: bool) -> String {
    if topics_enabled {
        format!(
            "Registered as {} on topic: {}",
            handle.role(),
            handle.topic()
        )
    } else {
        format!("Registered as {}", handle.role())
    }
}

/// Registry membership for the lifetime of this value.
struct Registration {
    registry: Arc<Registry>,
    handle: SessionHandle,
}

impl Registration {
    fn new(registry: Arc<Registry>, handle: SessionHandle) -> Self {
        registry.register(&handle);
        Self { registry, handle }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.handle);
    }
}
