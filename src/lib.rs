//! # TopicRelay
//!
//! `topicrelay` is a minimal publish/subscribe relay over TCP. Clients connect,
//! declare a role (publisher or subscriber) and a topic, and every line a
//! publisher sends is fanned out, tagged with its sender, to the subscribers
//! of the same topic. Delivery is best-effort and at-most-once; nothing is
//! stored or replayed.
//!
//! ## Core Modules
//!
//! - `broker`: the registry of sessions per topic and the fan-out of published lines.
//! - `session`: roles, registry handles and the per-connection state machine.
//! - `transport`: newline-delimited connections and the TCP acceptor.
//! - `client`: the interactive console client.
//! - `config`: layered settings from defaults, file and environment.
//! - `utils`: error type and logging.

pub mod broker;
pub mod client;
pub mod config;
pub mod session;
pub mod transport;
pub mod utils;

pub use crate::broker::Registry;
pub use crate::config::{Settings, load_config};
pub use crate::transport::start_server;
pub use crate::utils::RelayError;
