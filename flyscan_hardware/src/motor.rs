use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use flyscan_traits::clock::{Clock, MonotonicClock};
use flyscan_traits::{HwResult, Motor};

use crate::error::HwError;

/// Faults the simulated actuator can be told to exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorFault {
    #[default]
    None,
    /// Every `move_async` is rejected.
    RejectMoves,
    /// Moves are accepted but the axis never gets anywhere.
    Jammed,
    /// Readback queries time out.
    ReadbackTimeout,
}

#[derive(Debug)]
struct MotorState {
    /// Position at `since`.
    origin: f64,
    target: f64,
    since: Instant,
    speed: f64,
    moving: bool,
    limits: (f64, f64),
    fault: MotorFault,
}

/// Constant-speed actuator with instantaneous acceleration.
///
/// Clones share one axis, so a readback handle can live on another thread
/// (or inside a simulated trigger module) while the controller owns the
/// original.
#[derive(Debug, Clone)]
pub struct SimulatedMotor<C: Clock = MonotonicClock> {
    state: Arc<Mutex<MotorState>>,
    clock: C,
    speed_scale: f64,
}

impl SimulatedMotor<MonotonicClock> {
    pub fn new(position: f64) -> Self {
        Self::with_clock(position, MonotonicClock::new())
    }
}

impl<C: Clock> SimulatedMotor<C> {
    pub fn with_clock(position: f64, clock: C) -> Self {
        let since = clock.now();
        Self {
            state: Arc::new(Mutex::new(MotorState {
                origin: position,
                target: position,
                since,
                speed: 1.0,
                moving: false,
                limits: (0.0, 90.0),
                fault: MotorFault::None,
            })),
            clock,
            speed_scale: 1.0,
        }
    }

    /// Travel `scale` times faster than commanded. Positions are unaffected.
    pub fn with_speed_scale(mut self, scale: f64) -> Self {
        self.speed_scale = scale;
        self
    }

    /// Soft limits, degrees. Moves outside are rejected.
    pub fn with_limits(self, low: f64, high: f64) -> Self {
        self.lock().limits = (low, high);
        self
    }

    pub fn inject(&self, fault: MotorFault) {
        let now = self.clock.now();
        let mut s = self.lock();
        settle(&mut s, now, self.speed_scale);
        s.fault = fault;
    }

    fn lock(&self) -> MutexGuard<'_, MotorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current position without going through the fallible trait.
    pub fn position(&self) -> f64 {
        let now = self.clock.now();
        settle(&mut self.lock(), now, self.speed_scale)
    }

    pub fn speed(&self) -> f64 {
        self.lock().speed
    }

    pub fn target(&self) -> f64 {
        self.lock().target
    }
}

/// Advance the axis to `now`; returns the position.
fn settle(s: &mut MotorState, now: Instant, speed_scale: f64) -> f64 {
    if !s.moving {
        return s.origin;
    }
    if s.fault == MotorFault::Jammed {
        s.since = now;
        return s.origin;
    }
    let elapsed = now.saturating_duration_since(s.since).as_secs_f64();
    let travel = s.speed * speed_scale * elapsed;
    let remaining = (s.target - s.origin).abs();
    if travel >= remaining {
        s.origin = s.target;
        s.since = now;
        s.moving = false;
        tracing::trace!(position = s.origin, "simulated axis arrived");
        s.origin
    } else {
        s.origin + (s.target - s.origin).signum() * travel
    }
}

/// Re-anchor a moving axis so later speed or target changes apply from here.
fn reanchor(s: &mut MotorState, now: Instant, speed_scale: f64) {
    let pos = settle(s, now, speed_scale);
    s.origin = pos;
    s.since = now;
}

impl<C: Clock> Motor for SimulatedMotor<C> {
    fn set_speed(&mut self, deg_per_sec: f64) -> HwResult<()> {
        if !(deg_per_sec.is_finite() && deg_per_sec > 0.0) {
            return Err(Box::new(HwError::Rejected(format!(
                "speed must be > 0, got {deg_per_sec}"
            ))));
        }
        let now = self.clock.now();
        let mut s = self.lock();
        reanchor(&mut s, now, self.speed_scale);
        s.speed = deg_per_sec;
        tracing::debug!(speed = deg_per_sec, "simulated axis speed");
        Ok(())
    }

    fn move_async(&mut self, target_deg: f64) -> HwResult<()> {
        let now = self.clock.now();
        let mut s = self.lock();
        if s.fault == MotorFault::RejectMoves {
            return Err(Box::new(HwError::Rejected("axis disabled".into())));
        }
        let (low, high) = s.limits;
        if !(target_deg >= low && target_deg <= high) {
            return Err(Box::new(HwError::Rejected(format!(
                "target {target_deg}° outside soft limits [{low}, {high}]"
            ))));
        }
        reanchor(&mut s, now, self.speed_scale);
        s.target = target_deg;
        s.moving = s.origin != target_deg;
        tracing::debug!(from = s.origin, to = target_deg, "simulated axis move");
        Ok(())
    }

    fn is_busy(&mut self) -> HwResult<bool> {
        let now = self.clock.now();
        let mut s = self.lock();
        if s.fault == MotorFault::ReadbackTimeout {
            return Err(Box::new(HwError::Timeout));
        }
        settle(&mut s, now, self.speed_scale);
        Ok(s.moving)
    }

    fn current_position(&mut self) -> HwResult<f64> {
        let now = self.clock.now();
        let mut s = self.lock();
        if s.fault == MotorFault::ReadbackTimeout {
            return Err(Box::new(HwError::Timeout));
        }
        Ok(settle(&mut s, now, self.speed_scale))
    }
}
