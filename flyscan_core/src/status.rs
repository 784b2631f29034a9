//! Controller phase.

use std::fmt;

/// Where the controller is in the prepare -> execute -> complete sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    /// Gate written and run-up move issued; trigger not armed.
    Prepared,
    /// Trigger armed and fly-through move issued.
    Running,
    Completed,
    Aborted,
}

impl ScanPhase {
    /// Completed and Aborted are resting states; a new scan may start from them.
    #[inline]
    pub fn accepts_prepare(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Aborted)
    }

    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Prepared | Self::Running)
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Prepared => "prepared",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
