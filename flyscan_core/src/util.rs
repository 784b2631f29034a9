//! Common time/period helpers and the cancellable polling wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flyscan_traits::Clock;

use crate::error::HardwareFault;

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in milliseconds for a given sampling rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Poll `ready` until it returns `true`, the timeout elapses or `cancel` is set.
///
/// `ready` is evaluated at least once, so an already-satisfied condition
/// succeeds even with a zero timeout. Cancellation wins over readiness.
pub fn wait_until<C, F>(
    clock: &C,
    timeout: Duration,
    poll: Duration,
    cancel: &AtomicBool,
    mut ready: F,
) -> Result<(), HardwareFault>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<bool, HardwareFault>,
{
    let start = clock.now();
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(HardwareFault::Cancelled);
        }
        if ready()? {
            return Ok(());
        }
        let waited = clock.ms_since(start);
        if waited >= timeout_ms {
            tracing::debug!(waited_ms = waited, "wait timed out");
            return Err(HardwareFault::Timeout);
        }
        tracing::trace!(waited_ms = waited, "waiting");
        clock.sleep(poll);
    }
}
