use thiserror::Error;

use crate::status::ScanPhase;

/// Cause of a failed collaborator command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareFault {
    #[error("timed out")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Fault(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    /// Bad point count, time budget or motion parameters. No hardware touched.
    #[error("invalid scan request: {0}")]
    InvalidScanRequest(String),
    /// Energy or angle with no physical Bragg solution. No hardware touched.
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("invalid state: cannot {op} while {phase}")]
    InvalidState { op: &'static str, phase: ScanPhase },
    #[error("prepare failed at {step}: {cause}")]
    PrepareFailed {
        step: &'static str,
        cause: HardwareFault,
    },
    /// Raised only after disarm and speed reset have been attempted.
    #[error("execute failed at {step}: {cause}")]
    ExecuteFailed {
        step: &'static str,
        cause: HardwareFault,
    },
    #[error("cleanup failed: {0}")]
    CleanupFailed(String),
    #[error("frames {start}..{end} requested but only {available} available")]
    FrameRange {
        start: usize,
        end: usize,
        available: usize,
    },
    #[error("detector error: {0}")]
    Detector(HardwareFault),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motor")]
    MissingMotor,
    #[error("missing trigger module")]
    MissingTrigger,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
