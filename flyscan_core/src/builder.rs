//! Type-state builder for `FlyScan` and generic `build_controller` constructor.
//!
//! The builder enforces at compile time that a motor and a trigger module are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use flyscan_traits::clock::{Clock, MonotonicClock};
use flyscan_traits::{Motor, TriggerModule};

use crate::config::{MotionCfg, PositioningCfg, Timeouts};
use crate::controller::FlyScanController;
use crate::error::{BuildError, Report, Result};
use crate::status::ScanPhase;

/// Dynamically dispatched controller, as produced by the builder.
pub type FlyScan = FlyScanController<Box<dyn Motor + Send>, Box<dyn TriggerModule + Send>>;

impl FlyScan {
    /// Start building a controller.
    pub fn builder() -> FlyScanBuilder<Missing, Missing> {
        FlyScanBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct FlyScanBuilder<M, T> {
    motor: Option<Box<dyn Motor + Send>>,
    trigger: Option<Box<dyn TriggerModule + Send>>,
    motion: Option<MotionCfg>,
    positioning: Option<PositioningCfg>,
    timeouts: Option<Timeouts>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _m: PhantomData<M>,
    _t: PhantomData<T>,
}

impl Default for FlyScanBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            motor: None,
            trigger: None,
            motion: None,
            positioning: None,
            timeouts: None,
            clock: None,
            _m: PhantomData,
            _t: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> Report {
    Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and construct a controller.
///
/// Shared by `FlyScanBuilder::try_build()` and `build_controller()`.
fn validate_and_build<M: Motor, T: TriggerModule>(
    motor: M,
    trigger: T,
    motion: MotionCfg,
    positioning: PositioningCfg,
    timeouts: Timeouts,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<FlyScanController<M, T>> {
    if !(motion.max_speed.is_finite() && motion.max_speed > 0.0) {
        return Err(invalid("max_speed must be > 0"));
    }
    if !(motion.run_up.acceleration.is_finite() && motion.run_up.acceleration > 0.0) {
        return Err(invalid("acceleration must be > 0"));
    }
    if motion.run_up.scale_factor.is_nan() || motion.run_up.scale_factor < 1.0 {
        return Err(invalid("run-up scale factor must be >= 1.0"));
    }
    if !(motion.run_up.min_run_up_steps.is_finite()
        && motion.run_up.min_run_up_steps >= 0.0
        && motion.run_up.extra_run_up_deg.is_finite()
        && motion.run_up.extra_run_up_deg >= 0.0)
    {
        return Err(invalid("run-up floor and extra travel must be >= 0"));
    }
    if positioning.demand_tolerance.is_nan() || positioning.demand_tolerance < 0.0 {
        return Err(invalid("demand tolerance must be >= 0"));
    }
    if positioning.poll_interval.is_zero() {
        return Err(invalid("poll interval must be > 0"));
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };

    Ok(FlyScanController {
        motor,
        trigger,
        motion,
        positioning,
        timeouts,
        clock,
        cancel: Arc::new(AtomicBool::new(false)),
        phase: ScanPhase::Idle,
        plan: None,
        gate: None,
    })
}

impl<M, T> FlyScanBuilder<M, T> {
    /// Fallible build available in any type-state; reports missing pieces.
    pub fn try_build(self) -> Result<FlyScan> {
        let motor = self
            .motor
            .ok_or_else(|| Report::new(BuildError::MissingMotor))?;
        let trigger = self
            .trigger
            .ok_or_else(|| Report::new(BuildError::MissingTrigger))?;
        validate_and_build(
            motor,
            trigger,
            self.motion.unwrap_or_default(),
            self.positioning.unwrap_or_default(),
            self.timeouts.unwrap_or_default(),
            self.clock,
        )
    }

    pub fn with_motion(mut self, motion: MotionCfg) -> Self {
        self.motion = Some(motion);
        self
    }
    pub fn with_positioning(mut self, positioning: PositioningCfg) -> Self {
        self.positioning = Some(positioning);
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
    /// Defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

// Setters that advance type-state
impl<T> FlyScanBuilder<Missing, T> {
    pub fn with_motor(self, motor: impl Motor + Send + 'static) -> FlyScanBuilder<Set, T> {
        FlyScanBuilder {
            motor: Some(Box::new(motor)),
            trigger: self.trigger,
            motion: self.motion,
            positioning: self.positioning,
            timeouts: self.timeouts,
            clock: self.clock,
            _m: PhantomData,
            _t: PhantomData,
        }
    }
}

impl<M> FlyScanBuilder<M, Missing> {
    pub fn with_trigger(
        self,
        trigger: impl TriggerModule + Send + 'static,
    ) -> FlyScanBuilder<M, Set> {
        FlyScanBuilder {
            motor: self.motor,
            trigger: Some(Box::new(trigger)),
            motion: self.motion,
            positioning: self.positioning,
            timeouts: self.timeouts,
            clock: self.clock,
            _m: PhantomData,
            _t: PhantomData,
        }
    }
}

impl FlyScanBuilder<Set, Set> {
    /// Only available once the motor and trigger module are set.
    pub fn build(self) -> Result<FlyScan> {
        self.try_build()
    }
}

/// Build a statically dispatched controller from concrete collaborators.
pub fn build_controller<M, T>(
    motor: M,
    trigger: T,
    motion: MotionCfg,
    positioning: PositioningCfg,
    timeouts: Timeouts,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<FlyScanController<M, T>>
where
    M: Motor,
    T: TriggerModule,
{
    validate_and_build(motor, trigger, motion, positioning, timeouts, clock)
}
