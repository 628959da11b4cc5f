use std::fmt;
use std::str::FromStr;

use crate::utils::RelayError;

/// A session's fixed designation, negotiated once by the first handshake line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    /// The canonical upper-case wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Publisher => "PUBLISHER",
            Role::Subscriber => "SUBSCRIBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a role token: surrounding whitespace is ignored, case is folded.
impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case(Role::Publisher.as_str()) {
            Ok(Role::Publisher)
        } else if token.eq_ignore_ascii_case(Role::Subscriber.as_str()) {
            Ok(Role::Subscriber)
        } else {
            Err(RelayError::InvalidRole(token.to_string()))
        }
    }
}
