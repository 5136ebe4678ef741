//! Logging initialisation.
//!
//! The cachet crates log through `tracing`. This module installs a
//! `tracing-subscriber` registry configured from the environment:
//!
//! - `CACHET_DEBUG=1` - Enable debug logging
//! - `CACHET_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `CACHET_LOG_FORMAT=pretty|compact|json` - Set output format
//!
//! `RUST_LOG`, when set, takes precedence over the level.
//!
//! ```no_run
//! cachet::logging::init().expect("logging already initialised");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Minimum level to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Level {
    /// Parse a level name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            "off" | "none" => Some(Self::Off),
            _ => None,
        }
    }

    /// Directive understood by [`EnvFilter`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Compact,
    Json,
}

impl Format {
    /// Parse a format name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub debug: bool,
    pub level: Level,
    pub format: Format,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Compact,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = lookup("CACHET_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let level = lookup("CACHET_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("CACHET_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Compact);

        Self {
            debug,
            level,
            format,
        }
    }

    /// Install a global subscriber for this configuration.
    ///
    /// Fails if a global subscriber is already set.
    pub fn init(&self) -> Result<(), TryInitError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            Format::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            Format::Compact => registry.with(fmt::layer().compact()).try_init(),
            Format::Json => registry.with(fmt::layer().json()).try_init(),
        }?;

        tracing::debug!(level = self.level.as_str(), format = ?self.format, "Logging initialised");
        Ok(())
    }
}

/// Install a global subscriber configured from the environment.
pub fn init() -> Result<(), TryInitError> {
    LogConfig::from_env().init()
}
