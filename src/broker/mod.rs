//! The broker module holds the process-wide registry of sessions and the
//! fan-out that delivers a published line to every subscriber of its topic.
//!
//! - `registry`: `Registry`, the lock-guarded topic -> sessions tables.
//! - `topic`: the membership set for one topic and role.
//! - `message`: how a published line is tagged with its sender.

pub mod message;
pub mod registry;
pub mod topic;

pub use registry::{Registry, RegistryStats};
