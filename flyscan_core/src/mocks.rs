//! Scripted collaborators that record every command they receive.
//!
//! `RecordingMotor` and `RecordingTrigger` share one `CallLog`, so tests can
//! assert the relative order of motor and trigger commands. Queries
//! (`is_busy`, `current_position`, `is_armed`) are not recorded. The motor
//! arrives instantly at every move target.

use std::sync::{Arc, Mutex, MutexGuard};

use flyscan_traits::{HwResult, Motor, TriggerModule};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetSpeed(f64),
    MoveAsync(f64),
    GateStart(f64),
    GateWidth(f64),
    GateStep(f64),
    Arm,
    Disarm,
}

impl Call {
    /// Gate register writes, as opposed to motion and arming commands.
    pub fn is_gate_write(&self) -> bool {
        matches!(self, Self::GateStart(_) | Self::GateWidth(_) | Self::GateStep(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Recorded calls without gate register writes.
    pub fn motion_calls(&self) -> Vec<Call> {
        self.lock()
            .iter()
            .filter(|c| !c.is_gate_write())
            .cloned()
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

fn injected(what: &str) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::other(format!("injected {what} failure")))
}

/// Motor that records commands. Failures can be injected per command.
#[derive(Debug, Clone)]
pub struct RecordingMotor {
    log: CallLog,
    position: Arc<Mutex<f64>>,
    /// Reports busy for this many `is_busy` polls after each move.
    busy_polls: u32,
    remaining_busy: Arc<Mutex<u32>>,
    /// Never arrives: `is_busy` stays true.
    pub stuck: bool,
    pub fail_set_speed: bool,
    pub fail_move: bool,
}

impl RecordingMotor {
    pub fn new(log: CallLog, position: f64) -> Self {
        Self {
            log,
            position: Arc::new(Mutex::new(position)),
            busy_polls: 0,
            remaining_busy: Arc::new(Mutex::new(0)),
            stuck: false,
            fail_set_speed: false,
            fail_move: false,
        }
    }

    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    pub fn position(&self) -> f64 {
        *self.position.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Motor for RecordingMotor {
    fn set_speed(&mut self, deg_per_sec: f64) -> HwResult<()> {
        self.log.push(Call::SetSpeed(deg_per_sec));
        if self.fail_set_speed {
            return Err(injected("set_speed"));
        }
        Ok(())
    }

    fn move_async(&mut self, target_deg: f64) -> HwResult<()> {
        self.log.push(Call::MoveAsync(target_deg));
        if self.fail_move {
            return Err(injected("move"));
        }
        *self.position.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = target_deg;
        *self
            .remaining_busy
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = self.busy_polls;
        Ok(())
    }

    fn is_busy(&mut self) -> HwResult<bool> {
        if self.stuck {
            return Ok(true);
        }
        let mut remaining = self
            .remaining_busy
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn current_position(&mut self) -> HwResult<f64> {
        Ok(self.position())
    }
}

/// Trigger module that records commands and tracks its armed state.
#[derive(Debug, Clone)]
pub struct RecordingTrigger {
    log: CallLog,
    armed: Arc<Mutex<bool>>,
    pub fail_arm: bool,
    pub fail_disarm: bool,
    pub fail_gate: bool,
}

impl RecordingTrigger {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            armed: Arc::new(Mutex::new(false)),
            fail_arm: false,
            fail_disarm: false,
            fail_gate: false,
        }
    }

    /// Start out armed, as if a previous scan was left running.
    pub fn pre_armed(self) -> Self {
        *self.armed.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        self
    }

    pub fn armed(&self) -> bool {
        *self.armed.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn gate_write(&mut self, call: Call) -> HwResult<()> {
        self.log.push(call);
        if self.fail_gate {
            return Err(injected("gate write"));
        }
        if self.armed() {
            return Err(Box::new(std::io::Error::other("gate written while armed")));
        }
        Ok(())
    }
}

impl TriggerModule for RecordingTrigger {
    fn set_gate_start(&mut self, deg: f64) -> HwResult<()> {
        self.gate_write(Call::GateStart(deg))
    }
    fn set_gate_width(&mut self, deg: f64) -> HwResult<()> {
        self.gate_write(Call::GateWidth(deg))
    }
    fn set_gate_step(&mut self, deg: f64) -> HwResult<()> {
        self.gate_write(Call::GateStep(deg))
    }
    fn arm(&mut self) -> HwResult<()> {
        self.log.push(Call::Arm);
        if self.fail_arm {
            return Err(injected("arm"));
        }
        *self.armed.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        Ok(())
    }
    fn disarm(&mut self) -> HwResult<()> {
        self.log.push(Call::Disarm);
        if self.fail_disarm {
            return Err(injected("disarm"));
        }
        *self.armed.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = false;
        Ok(())
    }
    fn is_armed(&mut self) -> HwResult<bool> {
        Ok(self.armed())
    }
}
