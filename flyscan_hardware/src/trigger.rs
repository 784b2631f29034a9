use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flyscan_traits::clock::{Clock, MonotonicClock};
use flyscan_traits::{HwResult, TriggerModule};

use crate::error::HwError;
use crate::motor::SimulatedMotor;

const EPS: f64 = 1e-9;

#[derive(Debug, Default)]
struct GateState {
    start: f64,
    width: f64,
    step: f64,
    armed: bool,
    arm_position: Option<f64>,
    pulses: u32,
    fail_arm: bool,
}

impl GateState {
    fn expected_pulses(&self) -> u32 {
        if self.step <= 0.0 {
            return 1;
        }
        let n = (self.width / self.step).round().clamp(1.0, f64::from(u32::MAX));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = n as u32;
        n
    }

    /// Pulses emitted once the encoder has reached `pos` since arming.
    fn pulses_at(&self, pos: f64) -> u32 {
        let Some(arm_pos) = self.arm_position else {
            return 0;
        };
        let dir = if (self.start - arm_pos).abs() > EPS {
            (self.start - arm_pos).signum()
        } else if (pos - arm_pos).abs() > EPS {
            (pos - arm_pos).signum()
        } else {
            // Armed at the gate start and not moved yet.
            return u32::from(self.step <= 0.0);
        };
        let travelled = (pos - self.start) * dir;
        if travelled < -EPS {
            return 0;
        }
        if self.step <= 0.0 {
            return 1;
        }
        let k = ((travelled.max(0.0) + EPS) / self.step).floor() + 1.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let k = k.min(f64::from(u32::MAX)) as u32;
        k.min(self.expected_pulses())
    }
}

/// Position-compare module watching a simulated axis.
///
/// While armed it emits one pulse each time the encoder crosses
/// `start + k * step` (in the direction of travel), up to `width / step`
/// pulses. Writing a gate register while armed is rejected, as real
/// modules latch their gate on arm.
#[derive(Debug, Clone)]
pub struct SimulatedTriggerModule<C: Clock = MonotonicClock> {
    state: Arc<Mutex<GateState>>,
    encoder: SimulatedMotor<C>,
}

impl<C: Clock> SimulatedTriggerModule<C> {
    pub fn new(encoder: SimulatedMotor<C>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState::default())),
            encoder,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `arm` calls fail.
    pub fn fail_arm(&self, fail: bool) {
        self.lock().fail_arm = fail;
    }

    /// Pulses emitted since the gate was last written.
    pub fn pulses(&self) -> u32 {
        let mut s = self.lock();
        self.refresh(&mut s);
        s.pulses
    }

    pub fn armed(&self) -> bool {
        self.lock().armed
    }

    /// (start, width, step) as last written.
    pub fn gate(&self) -> (f64, f64, f64) {
        let s = self.lock();
        (s.start, s.width, s.step)
    }

    fn refresh(&self, s: &mut GateState) {
        if s.armed {
            let seen = s.pulses_at(self.encoder.position());
            s.pulses = s.pulses.max(seen);
        }
    }

    fn write(&mut self, f: impl FnOnce(&mut GateState)) -> HwResult<()> {
        let mut s = self.lock();
        if s.armed {
            return Err(Box::new(HwError::Rejected(
                "gate registers are locked while armed".into(),
            )));
        }
        f(&mut s);
        s.pulses = 0;
        Ok(())
    }
}

impl<C: Clock> TriggerModule for SimulatedTriggerModule<C> {
    fn set_gate_start(&mut self, deg: f64) -> HwResult<()> {
        self.write(|s| s.start = deg)
    }

    fn set_gate_width(&mut self, deg: f64) -> HwResult<()> {
        if deg < 0.0 {
            return Err(Box::new(HwError::Rejected(format!("gate width {deg} < 0"))));
        }
        self.write(|s| s.width = deg)
    }

    fn set_gate_step(&mut self, deg: f64) -> HwResult<()> {
        if deg < 0.0 {
            return Err(Box::new(HwError::Rejected(format!("gate step {deg} < 0"))));
        }
        self.write(|s| s.step = deg)
    }

    fn arm(&mut self) -> HwResult<()> {
        let pos = self.encoder.position();
        let mut s = self.lock();
        if s.fail_arm {
            return Err(Box::new(HwError::Fault("arm command not acknowledged".into())));
        }
        s.armed = true;
        s.arm_position = Some(pos);
        self.refresh(&mut s);
        tracing::debug!(at = pos, start = s.start, "simulated gate armed");
        Ok(())
    }

    fn disarm(&mut self) -> HwResult<()> {
        let mut s = self.lock();
        self.refresh(&mut s);
        if s.armed {
            tracing::debug!(pulses = s.pulses, "simulated gate disarmed");
        }
        s.armed = false;
        s.arm_position = None;
        Ok(())
    }

    fn is_armed(&mut self) -> HwResult<bool> {
        let mut s = self.lock();
        self.refresh(&mut s);
        Ok(s.armed)
    }
}
