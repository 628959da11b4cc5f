//! Published line decoration
//!
//! A publisher's line is relayed verbatim, prefixed with a tag naming the
//! publisher so subscribers can tell sources apart:
//!
//! ```text
//! [Publisher 10.0.0.7:51234]: GoalScored
//! ```

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Delivery {
    /// Publisher's `address:port`.
    pub sender: String,
    pub payload: String,
    pub published_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(sender: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            payload: payload.into(),
            published_at: Utc::now(),
        }
    }

    /// The line subscribers receive.
    pub fn render(&self) -> String {
        format!("[Publisher {}]: {}", self.sender, self.payload)
    }
}
