//! Error types for pledge.
//!
//! Failures of wrapped computations are not errors of the engine: they are
//! carried as [`ErrorValue`]s and routed to catch handlers. The types here
//! describe what goes wrong when *using* the engine:
//!
//! - [`PromiseError`]: reading an outcome that is not a success
//! - [`DispatchError`]: draining a phase from the wrong place
//! - [`ConfigError`]: rejecting an engine configuration

use crate::catch::ErrorValue;
use crate::types::{CancelReason, Phase};

/// Why a promise's result is unavailable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PromiseError {
    /// The promise has not settled yet.
    #[error("promise has not completed")]
    NotReady,
    /// The promise was canceled.
    #[error("promise canceled ({0})")]
    Canceled(CancelReason),
    /// The computation or a chained step failed.
    #[error("promise faulted: {0}")]
    Faulted(ErrorValue),
}

impl PromiseError {
    /// Returns true for [`PromiseError::Canceled`].
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }

    /// Returns the fault, if this is [`PromiseError::Faulted`].
    #[must_use]
    pub const fn fault(&self) -> Option<&ErrorValue> {
        match self {
            Self::Faulted(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors from driving the dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The phase has not been started, or was stopped.
    #[error("phase {phase} is not running")]
    NotRunning {
        /// The phase that was ticked.
        phase: Phase,
    },
    /// The calling thread is not the consumer bound to the phase.
    #[error("phase {phase} may only be drained by its consumer thread")]
    NotConsumer {
        /// The phase that was ticked.
        phase: Phase,
    },
}

/// Errors from loading or validating an engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds a value the engine cannot run with.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Reading the config file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for [`crate::EngineConfig`].
    #[cfg(feature = "config-file")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result alias for promise reads.
pub type Result<T, E = PromiseError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch::OperationCanceled;

    #[test]
    fn display_messages() {
        assert_eq!(PromiseError::NotReady.to_string(), "promise has not completed");
        assert_eq!(
            PromiseError::Canceled(CancelReason::shutdown()).to_string(),
            "promise canceled (shutdown)"
        );
        let err = DispatchError::NotConsumer {
            phase: Phase::Update,
        };
        assert_eq!(
            err.to_string(),
            "phase update may only be drained by its consumer thread"
        );
    }

    #[test]
    fn fault_accessor() {
        let err = PromiseError::Faulted(ErrorValue::new(OperationCanceled));
        assert!(err.fault().is_some());
        assert!(!err.is_canceled());
        assert!(PromiseError::Canceled(CancelReason::default()).is_canceled());
    }
}
