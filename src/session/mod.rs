//! The `session` module holds everything tied to one connected peer.
//!
//! - `Role`: publisher or subscriber, parsed from the first handshake line.
//! - `SessionHandle`: the non-owning entry the registry keeps for a session.
//! - `Session`: the per-connection state machine
//!   (`AwaitingRole -> AwaitingTopic -> Registered -> Closed`).

pub mod handle;
pub mod role;
pub mod state;

pub use handle::{SessionHandle, SessionId};
pub use role::Role;
pub use state::{CloseReason, Session, SessionOptions, SessionState};
