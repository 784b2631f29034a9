use std::time::Duration;

use flyscan_traits::{Motor, TriggerModule};

use crate::controller::FlyScanController;
use crate::error::Result;
use crate::gate::GateConfig;
use crate::profile::MotionPlan;
use crate::types::{CrystalGeometry, EnergyRange};

/// How much of the scan `run_scan` waits for.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Block until the actuator stops at the run-down position, then
    /// complete. When false, `run_scan` returns with the scan still running
    /// and the caller owns `wait_for_run_down` and `complete`.
    pub wait_for_run_down: bool,
    /// Overrides the controller's configured run-down timeout.
    pub run_down_timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wait_for_run_down: true,
            run_down_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOutcome {
    pub plan: MotionPlan,
    pub gate: GateConfig,
    pub elapsed_ms: u64,
}

/// Drive one scan end to end: prepare, execute, wait, complete.
///
/// Any failure after `prepare` aborts the controller (disarm, restore
/// speed) before the error is returned. No retries.
pub fn run_scan<M, T>(
    controller: &mut FlyScanController<M, T>,
    range: &EnergyRange,
    geometry: &CrystalGeometry,
    opts: &RunOptions,
) -> Result<ScanOutcome>
where
    M: Motor,
    T: TriggerModule,
{
    let clock = std::sync::Arc::clone(controller.clock());
    let epoch = clock.now();
    tracing::info!(
        start_ev = range.start,
        end_ev = range.end,
        points = range.point_count,
        time_s = range.total_time,
        "scan start"
    );

    let plan = controller.prepare(range, geometry)?;
    if let Err(e) = drive(controller, opts) {
        if let Err(cleanup) = controller.abort() {
            tracing::warn!(error = %cleanup, "abort after scan failure was incomplete");
        }
        tracing::error!(error = %e, "scan failed");
        return Err(e);
    }
    if opts.wait_for_run_down {
        controller.complete()?;
    }

    let gate = GateConfig::from_plan(&plan, range.point_count);
    let elapsed_ms = clock.ms_since(epoch);
    tracing::info!(elapsed_ms, "scan complete");
    Ok(ScanOutcome {
        plan,
        gate,
        elapsed_ms,
    })
}

fn drive<M, T>(controller: &mut FlyScanController<M, T>, opts: &RunOptions) -> Result<()>
where
    M: Motor,
    T: TriggerModule,
{
    controller.execute()?;
    if opts.wait_for_run_down {
        let timeout = opts
            .run_down_timeout
            .unwrap_or(controller.timeouts().run_down);
        controller.wait_for_run_down(timeout)?;
    }
    Ok(())
}
