//! Promise settlement state.

use core::fmt;

/// The settlement state of a promise.
///
/// `Pending` is the only non-terminal state. Each promise takes exactly one
/// edge out of `Pending` and never moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PromiseState {
    /// The computation has not settled.
    Pending = 0,
    /// The computation and every chained step succeeded.
    Succeeded = 1,
    /// The computation or a chained step failed.
    Faulted = 2,
    /// The promise was canceled before it could settle otherwise.
    Canceled = 3,
}

impl PromiseState {
    /// Returns true for every state except `Pending`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Succeeded,
            2 => Self::Faulted,
            3 => Self::Canceled,
            _ => Self::Pending,
        }
    }

    /// Returns the state name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Faulted => "faulted",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
