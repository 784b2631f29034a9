//! Background motor readback.
//!
//! Spawns a thread that owns a `Motor` readback handle, publishes the latest
//! sample over a one-slot channel, and tracks the last successful read time.
//!
//! Each `MotionMonitor` spawns exactly one thread, which is shut down and
//! joined when the monitor is dropped.
use crossbeam_channel as xch;
use flyscan_traits::Motor;
use flyscan_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSample {
    pub position: f64,
    pub busy: bool,
    /// Milliseconds since the monitor started.
    pub at_ms: u64,
}

pub struct MotionMonitor {
    rx: xch::Receiver<MotorSample>,
    last_ok: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl MotionMonitor {
    pub fn spawn<M: Motor + Send + 'static, C: Clock + Send + Sync + 'static>(
        mut readback: M,
        hz: u32,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        // The thread keeps a receiver so it can drop a stale sample and never
        // block on a full slot.
        let stale = rx.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let period = Duration::from_millis(crate::util::period_ms(hz));
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("monitor thread received shutdown signal");
                    break;
                }

                let read = readback
                    .current_position()
                    .and_then(|position| readback.is_busy().map(|busy| (position, busy)));
                match read {
                    Ok((position, busy)) => {
                        let at_ms = clock.ms_since(epoch);
                        let sample = MotorSample {
                            position,
                            busy,
                            at_ms,
                        };
                        if let Err(xch::TrySendError::Full(sample)) = tx.try_send(sample) {
                            let _ = stale.try_recv();
                            let _ = tx.try_send(sample);
                        }
                        last_ok_clone.store(at_ms, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "monitor readback failed");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("monitor thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent sample not yet taken, if any.
    pub fn latest(&self) -> Option<MotorSample> {
        self.rx.try_iter().last()
    }

    /// Time of the last successful readback, ms since spawn. 0 before the first.
    pub fn last_ok_ms(&self) -> u64 {
        self.last_ok.load(Ordering::Relaxed)
    }
}

impl Drop for MotionMonitor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("monitor thread joined");
                }
                Err(e) => {
                    tracing::warn!(?e, "monitor thread panicked during shutdown");
                }
            }
        }
    }
}
