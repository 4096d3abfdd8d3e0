//! Engine configuration types.
//!
//! In most cases you should use [`EngineBuilder`](super::builder::EngineBuilder)
//! to construct an engine rather than creating an [`EngineConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `default_phase` | `initialization` |
//! | `poll_interval_ms` | 50 |
//! | `worker_name_prefix` | `"pledge-worker"` |
//! | `autostart_phases` | every phase |
//!
//! With the `config-file` feature the same fields load from TOML:
//!
//! ```toml
//! default_phase = "update"
//! poll_interval_ms = 20
//! worker_name_prefix = "game-io"
//! autostart_phases = ["update", "end_of_frame"]
//! ```

use crate::error::ConfigError;
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default polling interval for `wait_until`, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default worker thread name prefix.
pub const DEFAULT_WORKER_PREFIX: &str = "pledge-worker";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Phase new promises deliver their callbacks on.
    pub default_phase: Phase,
    /// Interval between predicate checks in `wait_until`.
    pub poll_interval_ms: u64,
    /// Name prefix for promise worker threads.
    pub worker_name_prefix: String,
    /// Phases started on the building thread by `build()`.
    pub autostart_phases: Vec<Phase>,
}

impl EngineConfig {
    /// Returns the `wait_until` polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Checks that the engine can run with these values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be at least 1",
            });
        }
        if self.worker_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "worker_name_prefix",
                reason: "must not be empty",
            });
        }
        if self.worker_name_prefix.contains('\0') {
            return Err(ConfigError::Invalid {
                field: "worker_name_prefix",
                reason: "must not contain NUL bytes",
            });
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_phase: Phase::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            worker_name_prefix: DEFAULT_WORKER_PREFIX.to_string(),
            autostart_phases: Phase::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.autostart_phases.len(), Phase::COUNT);
    }

    #[test]
    fn rejects_zero_interval_and_blank_prefix() {
        let config = EngineConfig {
            poll_interval_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                ..
            })
        ));

        let config = EngineConfig {
            worker_name_prefix: "  ".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "worker_name_prefix",
                ..
            })
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            default_phase = "update"
            autostart_phases = ["update"]
            "#,
        )
        .unwrap();
        assert_eq!(config.default_phase, Phase::Update);
        assert_eq!(config.autostart_phases, vec![Phase::Update]);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.worker_name_prefix, DEFAULT_WORKER_PREFIX);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<EngineConfig, _> = toml::from_str("threads = 4");
        assert!(parsed.is_err());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn from_toml_str_validates() {
        let err = EngineConfig::from_toml_str("poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        let err = EngineConfig::from_toml_str("default_phase = \"nope\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
