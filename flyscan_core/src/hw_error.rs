//! Maps `Box<dyn Error>` from trait boundaries to a typed `HardwareFault`.
//!
//! The traits in `flyscan_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those at the edge, with an optional feature-gated path for
//! `flyscan_hardware::HwError` downcasting.

use crate::error::{HardwareFault, ScanError};

/// Map a trait-boundary error to a typed `HardwareFault`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> HardwareFault {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<flyscan_hardware::HwError>() {
            return match hw {
                flyscan_hardware::HwError::Timeout => HardwareFault::Timeout,
                other => HardwareFault::Fault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        HardwareFault::Timeout
    } else {
        HardwareFault::Fault(s)
    }
}

/// Map a detector read error, keeping frame-range details intact.
pub fn map_detector_error(e: &(dyn std::error::Error + 'static)) -> ScanError {
    if let Some(range) = e.downcast_ref::<flyscan_traits::FrameRangeError>() {
        return ScanError::FrameRange {
            start: range.start,
            end: range.end,
            available: range.available,
        };
    }
    ScanError::Detector(map_hw_error(e))
}
