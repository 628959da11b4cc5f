//! The `client` module is the interactive console peer for the relay.
//!
//! A client connects, performs the handshake for its role (and topic), then
//! either publishes stdin lines or prints what the relay delivers, until the
//! user types `terminate`.

pub mod console;

pub use console::{ClientOptions, run, run_with_io};

#[cfg(test)]
mod tests;
