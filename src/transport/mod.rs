//! The `transport` module is responsible for network communication with
//! clients over plain TCP.
//!
//! - `connection`: newline-delimited text over a byte stream, with a send loop
//!   fed by a channel.
//! - `server`: the acceptor, spawning one session per connection and closing
//!   them all on shutdown.

pub mod connection;
pub mod server;

pub use server::{bind, serve, start_server};
