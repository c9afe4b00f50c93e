//! Event loop configuration.

use super::env_config;
use super::Capabilities;

/// How an [`EventLoop`](super::EventLoop) reacts to unhandled failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnhandledResponse {
    /// Panic with the failure (unless the thread is already panicking).
    Panic,
    /// Log at error level and record it.
    Log,
    /// Record it without logging.
    Silent,
}

impl UnhandledResponse {
    pub(crate) fn parse(val: &str) -> Option<Self> {
        match val.trim().to_ascii_lowercase().as_str() {
            "panic" => Some(Self::Panic),
            "log" => Some(Self::Log),
            "silent" => Some(Self::Silent),
            _ => None,
        }
    }
}

/// Error raised while building a [`LoopConfig`] from external input.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// A TOML document could not be parsed.
    #[error("failed to parse TOML config: {0}")]
    Toml(String),
}

/// Event loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Deferral primitives the loop advertises to the scheduler adapter.
    pub capabilities: Capabilities,
    /// Reaction to failures nobody consumed.
    pub unhandled_response: UnhandledResponse,
    /// How many unhandled failures are kept for `take_unhandled` (0 = unbounded).
    pub max_recorded_unhandled: usize,
}

impl LoopConfig {
    /// Defaults with `ABB_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        env_config::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Defaults overridden by a TOML document, then by the environment.
    ///
    /// ```toml
    /// [host]
    /// primitives = ["microtask"]
    ///
    /// [unhandled]
    /// response = "silent"
    /// max_recorded = 16
    /// ```
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let parsed = env_config::parse_toml_str(toml_str)?;
        let mut config = Self::default();
        env_config::apply_toml_config(&mut config, &parsed)?;
        env_config::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Sets the advertised capabilities.
    #[must_use]
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the unhandled-failure response.
    #[must_use]
    pub fn unhandled_response(mut self, response: UnhandledResponse) -> Self {
        self.unhandled_response = response;
        self
    }

    /// Sets how many unhandled failures are recorded.
    #[must_use]
    pub fn max_recorded_unhandled(mut self, max: usize) -> Self {
        self.max_recorded_unhandled = max;
        self
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::ALL,
            unhandled_response: UnhandledResponse::Log,
            max_recorded_unhandled: 64,
        }
    }
}
