//! Host loop phases.
//!
//! A phase names one slot of the host's frame loop. Each phase owns one
//! dispatch queue that is drained when the host ticks that phase.

use core::fmt;
use serde::{Deserialize, Serialize};

/// A logical phase of the host frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Start of frame, before anything else runs.
    #[default]
    Initialization,
    /// Early update, after input is collected.
    EarlyUpdate,
    /// Fixed-timestep update.
    FixedUpdate,
    /// Immediately before the main update.
    PreUpdate,
    /// Main update.
    Update,
    /// Before late update.
    PreLateUpdate,
    /// After late update, before presentation.
    PostLateUpdate,
    /// Clock advancement.
    TimeUpdate,
    /// After the frame has been presented.
    EndOfFrame,
}

impl Phase {
    /// Number of phases.
    pub const COUNT: usize = 9;

    /// All phases in frame order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Initialization,
        Self::EarlyUpdate,
        Self::FixedUpdate,
        Self::PreUpdate,
        Self::Update,
        Self::PreLateUpdate,
        Self::PostLateUpdate,
        Self::TimeUpdate,
        Self::EndOfFrame,
    ];

    /// Returns the dense index of this phase.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Initialization => 0,
            Self::EarlyUpdate => 1,
            Self::FixedUpdate => 2,
            Self::PreUpdate => 3,
            Self::Update => 4,
            Self::PreLateUpdate => 5,
            Self::PostLateUpdate => 6,
            Self::TimeUpdate => 7,
            Self::EndOfFrame => 8,
        }
    }

    /// Returns the phase name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::EarlyUpdate => "early_update",
            Self::FixedUpdate => "fixed_update",
            Self::PreUpdate => "pre_update",
            Self::Update => "update",
            Self::PreLateUpdate => "pre_late_update",
            Self::PostLateUpdate => "post_late_update",
            Self::TimeUpdate => "time_update",
            Self::EndOfFrame => "end_of_frame",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
