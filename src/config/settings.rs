use serde::Deserialize;

/// Top-level configuration settings for the relay.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub relay: RelaySettings,
    pub log: LogSettings,
}

/// Host and port the acceptor binds to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Behaviour of the registry and the session handshake.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RelaySettings {
    /// When false, sessions skip the topic line and share one implicit channel.
    pub topics_enabled: bool,
    /// Drop a topic entry from the registry once its last member leaves.
    pub prune_empty_topics: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

impl Settings {
    /// The `host:port` string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub relay: Option<PartialRelaySettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRelaySettings {
    pub topics_enabled: Option<bool>,
    pub prune_empty_topics: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Merges what was provided over the defaults, field by field.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();

        Settings {
            server: ServerSettings {
                host: self
                    .server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: self
                    .server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            relay: RelaySettings {
                topics_enabled: self
                    .relay
                    .as_ref()
                    .and_then(|r| r.topics_enabled)
                    .unwrap_or(default.relay.topics_enabled),
                prune_empty_topics: self
                    .relay
                    .as_ref()
                    .and_then(|r| r.prune_empty_topics)
                    .unwrap_or(default.relay.prune_empty_topics),
            },
            log: LogSettings {
                level: self
                    .log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            relay: RelaySettings {
                topics_enabled: true,
                prune_empty_topics: false,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
