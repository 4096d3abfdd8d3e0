//! Engine builder.

use super::config::EngineConfig;
use super::engine::Engine;
use crate::error::ConfigError;
use crate::types::Phase;
use std::time::Duration;

/// Builder for [`Engine`].
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .default_phase(Phase::Update)
///     .poll_interval(Duration::from_millis(20))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the phase new promises deliver callbacks on.
    #[must_use]
    pub fn default_phase(mut self, phase: Phase) -> Self {
        self.config.default_phase = phase;
        self
    }

    /// Set the `wait_until` polling interval.
    ///
    /// Sub-millisecond intervals round down and are rejected by `build()`
    /// if they reach zero.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.worker_name_prefix = prefix.into();
        self
    }

    /// Set the phases `build()` starts on the calling thread.
    #[must_use]
    pub fn autostart_phases(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.config.autostart_phases = phases.into_iter().collect();
        self
    }

    /// Leave every phase stopped; the host starts them from its consumer
    /// threads.
    #[must_use]
    pub fn manual_start(self) -> Self {
        self.autostart_phases([])
    }

    /// Loads configuration from a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(Self::new().config(EngineConfig::from_toml_str(source)?))
    }

    /// Loads configuration from a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Ok(Self::new().config(EngineConfig::from_file(path)?))
    }

    /// Validates the configuration and builds the engine.
    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;
        Ok(Engine::with_config(self.config))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
