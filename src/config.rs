//! Engine and console configuration.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::ring_buffer::MAX_EVENTS;

/// Environment variable overriding [`Config::default_capacity`].
pub const ENV_CAPACITY: &str = "RINGLOG_CAPACITY";
/// Environment variable overriding [`Config::start_enabled`].
pub const ENV_ENABLED: &str = "RINGLOG_ENABLED";
/// Environment variable overriding [`Config::indentation`].
pub const ENV_INDENT: &str = "RINGLOG_INDENT";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the default buffer. 0 creates no default buffer.
    pub default_capacity: usize,
    /// Whether logging is enabled right after init.
    pub start_enabled: bool,
    /// Whether displayed events are indented by their nesting depth.
    pub indentation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_capacity: MAX_EVENTS,
            start_enabled: true,
            indentation: false,
        }
    }
}

impl Config {
    /// Create a new builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Defaults overridden by `RINGLOG_CAPACITY`, `RINGLOG_ENABLED` and
    /// `RINGLOG_INDENT`.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_CAPACITY) {
            match raw.trim().parse() {
                Ok(capacity) => config.default_capacity = capacity,
                Err(_) => tracing::warn!(var = ENV_CAPACITY, value = %raw, "ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(ENV_ENABLED) {
            match parse_flag(&raw) {
                Some(flag) => config.start_enabled = flag,
                None => tracing::warn!(var = ENV_ENABLED, value = %raw, "ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(ENV_INDENT) {
            match parse_flag(&raw) {
                Some(flag) => config.indentation = flag,
                None => tracing::warn!(var = ENV_INDENT, value = %raw, "ignoring invalid value"),
            }
        }
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    default_capacity: Option<usize>,
    start_enabled: Option<bool>,
    indentation: Option<bool>,
}

impl ConfigBuilder {
    /// Set the default buffer capacity.
    pub fn default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = Some(capacity);
        self
    }

    /// Start with logging enabled or disabled.
    pub fn start_enabled(mut self, enabled: bool) -> Self {
        self.start_enabled = Some(enabled);
        self
    }

    /// Render indentation when displaying events.
    pub fn indentation(mut self, enabled: bool) -> Self {
        self.indentation = Some(enabled);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            default_capacity: self.default_capacity.unwrap_or(defaults.default_capacity),
            start_enabled: self.start_enabled.unwrap_or(defaults.start_enabled),
            indentation: self.indentation.unwrap_or(defaults.indentation),
        }
    }
}

/// Inspection console configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Listen address. Port 0 picks a free port.
    pub bind: SocketAddr,
    /// Directory receiving the `<pid>_ringlog_console_<port>` marker file.
    pub marker_dir: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            marker_dir: env::temp_dir(),
        }
    }
}

impl ConsoleConfig {
    /// Create a new builder.
    pub fn builder() -> ConsoleConfigBuilder {
        ConsoleConfigBuilder::default()
    }
}

/// Builder for [`ConsoleConfig`].
#[derive(Debug, Default)]
pub struct ConsoleConfigBuilder {
    bind: Option<SocketAddr>,
    marker_dir: Option<PathBuf>,
}

impl ConsoleConfigBuilder {
    /// Set the listen address.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind = Some(addr);
        self
    }

    /// Set only the listen port, keeping the default address.
    pub fn port(mut self, port: u16) -> Self {
        self.bind = Some(SocketAddr::from(([0, 0, 0, 0], port)));
        self
    }

    /// Set the marker file directory.
    pub fn marker_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.marker_dir = Some(dir.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ConsoleConfig {
        let defaults = ConsoleConfig::default();
        ConsoleConfig {
            bind: self.bind.unwrap_or(defaults.bind),
            marker_dir: self.marker_dir.unwrap_or(defaults.marker_dir),
        }
    }
}
