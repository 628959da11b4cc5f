//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `TOPICRELAY__*` environment variables.

mod settings;

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};

use crate::utils::RelayError;

pub use settings::{LogSettings, PartialSettings, RelaySettings, ServerSettings, Settings};

/// Default config file, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of environment overrides, e.g. `TOPICRELAY__SERVER__PORT=6000`.
pub const ENV_PREFIX: &str = "TOPICRELAY";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, RelayError> {
    let builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
        .add_source(environment());

    build(builder)
}

/// Loads the configuration from an explicit file, which must exist, plus
/// environment variables.
pub fn load_config_from(path: &Path) -> Result<Settings, RelayError> {
    let builder = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(environment());

    build(builder)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<Settings, RelayError> {
    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}
