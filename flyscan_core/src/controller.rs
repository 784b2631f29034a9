//! Prepare -> execute -> complete sequencing against a motor and a
//! position-compare trigger module.
//!
//! Command order is fixed:
//! `set_speed(max) -> [disarm if armed] -> gate writes -> move(run-up) ->
//! [settle wait] -> set_speed(scan) -> arm -> move(run-down)`.
//! Every hardware failure, in `prepare` or later, runs the cleanup (disarm,
//! restore max speed) before the error is returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flyscan_traits::{Clock, HwResult, Motor, TriggerModule};

use crate::config::{MotionCfg, PositioningCfg, Timeouts};
use crate::error::{HardwareFault, Report, Result, ScanError};
use crate::gate::GateConfig;
use crate::hw_error::map_hw_error;
use crate::profile::{MotionPlan, MotionProfile};
use crate::status::ScanPhase;
use crate::types::{CrystalGeometry, EnergyRange};
use crate::util;

/// A collaborator command that failed, tagged with the step it belongs to.
#[derive(Debug)]
struct StepFault {
    step: &'static str,
    cause: HardwareFault,
}

#[inline]
fn hw<R>(step: &'static str, r: HwResult<R>) -> std::result::Result<R, StepFault> {
    r.map_err(|e| StepFault {
        step,
        cause: map_hw_error(&*e),
    })
}

pub struct FlyScanController<M: Motor, T: TriggerModule> {
    pub(crate) motor: M,
    pub(crate) trigger: T,
    pub(crate) motion: MotionCfg,
    pub(crate) positioning: PositioningCfg,
    pub(crate) timeouts: Timeouts,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) cancel: Arc<AtomicBool>,
    pub(crate) phase: ScanPhase,
    pub(crate) plan: Option<MotionPlan>,
    pub(crate) gate: Option<GateConfig>,
}

impl<M: Motor, T: TriggerModule> core::fmt::Debug for FlyScanController<M, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlyScanController")
            .field("phase", &self.phase)
            .field("plan", &self.plan)
            .field("gate", &self.gate)
            .field("max_speed", &self.motion.max_speed)
            .finish_non_exhaustive()
    }
}

impl<M: Motor, T: TriggerModule> FlyScanController<M, T> {
    #[inline]
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Plan of the current (or last) scan.
    #[inline]
    pub fn plan(&self) -> Option<&MotionPlan> {
        self.plan.as_ref()
    }

    #[inline]
    pub fn gate(&self) -> Option<&GateConfig> {
        self.gate.as_ref()
    }

    #[inline]
    pub fn motion_cfg(&self) -> &MotionCfg {
        &self.motion
    }

    #[inline]
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Flag observed by every wait loop. Setting it makes the pending wait
    /// fail with `HardwareFault::Cancelled`. A flag already set when
    /// `prepare` is called stops the scan before any hardware is touched.
    /// Every cleanup clears it.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Compute the plan and gate, then position the hardware for the run-up.
    ///
    /// Returns as soon as the run-up move is issued. Nothing is sent to the
    /// hardware when the request is invalid.
    pub fn prepare(&mut self, range: &EnergyRange, geometry: &CrystalGeometry) -> Result<MotionPlan> {
        if !self.phase.accepts_prepare() {
            return Err(Report::new(ScanError::InvalidState {
                op: "prepare",
                phase: self.phase,
            }));
        }
        let plan = MotionProfile::compute_with(range, geometry, &self.motion.run_up)
            .map_err(Report::new)?;
        if plan.speed() > self.motion.max_speed {
            return Err(Report::new(ScanError::InvalidScanRequest(format!(
                "scan speed {:.5} deg/s exceeds motor maximum {} deg/s; lengthen the scan time",
                plan.speed(),
                self.motion.max_speed
            ))));
        }
        let gate = GateConfig::from_plan(&plan, range.point_count);

        self.phase = ScanPhase::Idle;
        self.plan = None;
        self.gate = None;

        if self.cancel.swap(false, Ordering::Relaxed) {
            tracing::warn!("cancel requested before prepare; nothing sent to hardware");
            return Err(Report::new(ScanError::PrepareFailed {
                step: "prepare",
                cause: HardwareFault::Cancelled,
            }));
        }

        if let Err(f) = self.prepare_hardware(&plan, &gate) {
            tracing::error!(step = f.step, cause = %f.cause, "prepare failed; cleaning up");
            if let Err(msg) = self.cleanup() {
                tracing::warn!(error = %msg, "cleanup after prepare failure was incomplete");
            }
            return Err(Report::new(ScanError::PrepareFailed {
                step: f.step,
                cause: f.cause,
            }));
        }

        self.plan = Some(plan);
        self.gate = Some(gate);
        self.phase = ScanPhase::Prepared;
        tracing::info!(
            start_deg = plan.start_angle,
            end_deg = plan.end_angle,
            approach_deg = self.approach_target(&plan),
            pulses = gate.pulse_count(),
            "scan prepared"
        );
        Ok(plan)
    }

    fn prepare_hardware(
        &mut self,
        plan: &MotionPlan,
        gate: &GateConfig,
    ) -> std::result::Result<(), StepFault> {
        hw("set_speed(max)", self.motor.set_speed(self.motion.max_speed))?;
        // Gate registers must not change under an armed module.
        if hw("is_armed", self.trigger.is_armed())? {
            tracing::warn!("trigger module armed before prepare; disarming");
            hw("disarm", self.trigger.disarm())?;
        }
        hw("set_gate_start", self.trigger.set_gate_start(gate.start))?;
        hw("set_gate_width", self.trigger.set_gate_width(gate.width))?;
        hw("set_gate_step", self.trigger.set_gate_step(gate.step))?;
        let approach = self.approach_target(plan);
        hw("move_async(run_up)", self.motor.move_async(approach))?;
        Ok(())
    }

    /// Where the actuator parks before the sweep.
    fn approach_target(&self, plan: &MotionPlan) -> f64 {
        if self.positioning.use_run_up {
            plan.run_up_position
        } else {
            plan.start_angle
        }
    }

    /// Where the gated sweep stops.
    fn sweep_target(&self, plan: &MotionPlan) -> f64 {
        if self.positioning.use_run_down {
            plan.run_down_position
        } else {
            plan.end_angle
        }
    }

    /// Start the gated sweep: settle at run-up, set scan speed, arm, move to run-down.
    ///
    /// On any failure the cleanup runs, the phase becomes `Aborted` and
    /// `ExecuteFailed` is returned.
    pub fn execute(&mut self) -> Result<()> {
        let plan = match (self.phase, self.plan) {
            (ScanPhase::Prepared, Some(plan)) => plan,
            (phase, _) => {
                return Err(Report::new(ScanError::InvalidState {
                    op: "execute",
                    phase,
                }));
            }
        };

        if let Err(f) = self.execute_steps(&plan) {
            tracing::error!(step = f.step, cause = %f.cause, "execute failed; cleaning up");
            if let Err(msg) = self.cleanup() {
                tracing::warn!(error = %msg, "cleanup after execute failure was incomplete");
            }
            self.phase = ScanPhase::Aborted;
            return Err(Report::new(ScanError::ExecuteFailed {
                step: f.step,
                cause: f.cause,
            }));
        }

        self.phase = ScanPhase::Running;
        tracing::info!(
            speed_deg_s = plan.speed(),
            sweep_to_deg = self.sweep_target(&plan),
            "scan running"
        );
        Ok(())
    }

    fn execute_steps(&mut self, plan: &MotionPlan) -> std::result::Result<(), StepFault> {
        if self.positioning.wait_for_run_up {
            let approach = self.approach_target(plan);
            self.wait_settled_at(approach, self.timeouts.in_position)
                .map_err(|cause| StepFault {
                    step: "in_position",
                    cause,
                })?;
        }
        // A single-point scan stays at maximum speed.
        if !plan.is_degenerate() {
            hw("set_speed(scan)", self.motor.set_speed(plan.speed()))?;
        }
        hw("arm", self.trigger.arm())?;
        let sweep_to = self.sweep_target(plan);
        hw("move_async(run_down)", self.motor.move_async(sweep_to))?;
        Ok(())
    }

    /// Block until the fly-through move has stopped at the run-down position.
    ///
    /// A timeout or cancellation runs the cleanup and aborts the scan.
    pub fn wait_for_run_down(&mut self, timeout: Duration) -> Result<()> {
        let target = match (self.phase, self.plan) {
            (ScanPhase::Running, Some(plan)) => self.sweep_target(&plan),
            (phase, _) => {
                return Err(Report::new(ScanError::InvalidState {
                    op: "wait for run-down",
                    phase,
                }));
            }
        };
        if let Err(cause) = self.wait_settled_at(target, timeout) {
            tracing::error!(%cause, "run-down not reached; aborting");
            if let Err(msg) = self.cleanup() {
                tracing::warn!(error = %msg, "cleanup after run-down failure was incomplete");
            }
            self.phase = ScanPhase::Aborted;
            return Err(Report::new(ScanError::ExecuteFailed {
                step: "wait_for_run_down",
                cause,
            }));
        }
        tracing::debug!(target_deg = target, "run-down reached");
        Ok(())
    }

    fn wait_settled_at(
        &mut self,
        target: f64,
        timeout: Duration,
    ) -> std::result::Result<(), HardwareFault> {
        let tolerance = self.positioning.demand_tolerance;
        let motor = &mut self.motor;
        util::wait_until(
            &*self.clock,
            timeout,
            self.positioning.poll_interval,
            &self.cancel,
            || {
                let busy = motor.is_busy().map_err(|e| map_hw_error(&*e))?;
                if busy {
                    return Ok(false);
                }
                let pos = motor.current_position().map_err(|e| map_hw_error(&*e))?;
                Ok((pos - target).abs() <= tolerance)
            },
        )
    }

    /// Disarm and restore maximum speed. Safe to call in any phase, any
    /// number of times.
    pub fn complete(&mut self) -> Result<()> {
        let result = self.cleanup();
        let before = self.phase;
        self.phase = match before {
            ScanPhase::Running => ScanPhase::Completed,
            ScanPhase::Prepared => ScanPhase::Aborted,
            other => other,
        };
        if before != self.phase {
            tracing::info!(phase = %self.phase, "scan finished");
        }
        result.map_err(|msg| Report::new(ScanError::CleanupFailed(msg)))
    }

    /// Cleanup and force the phase to `Aborted`.
    pub fn abort(&mut self) -> Result<()> {
        let result = self.cleanup();
        if self.phase != ScanPhase::Aborted {
            tracing::warn!(from = %self.phase, "scan aborted");
        }
        self.phase = ScanPhase::Aborted;
        result.map_err(|msg| Report::new(ScanError::CleanupFailed(msg)))
    }

    /// Both commands are always attempted. Clears any pending cancel request.
    fn cleanup(&mut self) -> std::result::Result<(), String> {
        self.cancel.store(false, Ordering::Relaxed);
        let disarm = self.trigger.disarm().map_err(|e| format!("disarm: {e}"));
        let speed = self
            .motor
            .set_speed(self.motion.max_speed)
            .map_err(|e| format!("set_speed(max): {e}"));
        match (disarm, speed) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(a), Err(b)) => Err(format!("{a}; {b}")),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        }
    }
}

impl<M: Motor, T: TriggerModule> Drop for FlyScanController<M, T> {
    fn drop(&mut self) {
        if self.phase.is_active() {
            tracing::warn!(phase = %self.phase, "controller dropped mid-scan; cleaning up");
            if let Err(msg) = self.cleanup() {
                tracing::warn!(error = %msg, "cleanup on drop was incomplete");
            }
        }
    }
}
