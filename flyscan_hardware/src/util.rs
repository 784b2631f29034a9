use std::time::Duration;

use flyscan_traits::{Clock, Motor};

use crate::error::{HwError, Result};

/// Wait until `motor` stops moving or `timeout` expires, returning the
/// position it stopped at. Polls at `poll_interval` on the given clock.
pub fn wait_until_idle<M, C>(
    motor: &mut M,
    clock: &C,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<f64>
where
    M: Motor + ?Sized,
    C: Clock + ?Sized,
{
    let start = clock.now();
    loop {
        let busy = motor
            .is_busy()
            .map_err(|e| HwError::Fault(e.to_string()))?;
        if !busy {
            return motor
                .current_position()
                .map_err(|e| HwError::Fault(e.to_string()));
        }
        if clock.now().saturating_duration_since(start) >= timeout {
            return Err(HwError::Timeout);
        }
        clock.sleep(poll_interval);
    }
}
