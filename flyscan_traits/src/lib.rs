//! Capability traits for the collaborators a fly scan drives.
//!
//! Every method returns `Box<dyn Error + Send + Sync>` on failure so that real
//! drivers and simulations can surface their own error types; the core maps
//! them to typed errors at the boundary.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Result type used at every collaborator boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Diffraction-angle actuator. Angles in degrees, speeds in deg/s.
pub trait Motor {
    fn set_speed(&mut self, deg_per_sec: f64) -> HwResult<()>;
    /// Start a move and return immediately.
    fn move_async(&mut self, target_deg: f64) -> HwResult<()>;
    fn is_busy(&mut self) -> HwResult<bool>;
    fn current_position(&mut self) -> HwResult<f64>;
}

/// Position-compare module emitting one pulse per `step` degrees inside the gate.
pub trait TriggerModule {
    fn set_gate_start(&mut self, deg: f64) -> HwResult<()>;
    fn set_gate_width(&mut self, deg: f64) -> HwResult<()>;
    fn set_gate_step(&mut self, deg: f64) -> HwResult<()>;
    fn arm(&mut self) -> HwResult<()>;
    fn disarm(&mut self) -> HwResult<()>;
    fn is_armed(&mut self) -> HwResult<bool>;
}

/// Detector buffering one frame per trigger pulse.
pub trait BufferedDetector {
    fn number_of_frames_available(&mut self) -> HwResult<usize>;
    /// Frames `start..end`, frame-major: `out[frame][channel]`.
    fn read_frames(&mut self, start: usize, end: usize) -> HwResult<Vec<Vec<f64>>>;
}

impl<M: Motor + ?Sized> Motor for Box<M> {
    fn set_speed(&mut self, deg_per_sec: f64) -> HwResult<()> {
        (**self).set_speed(deg_per_sec)
    }
    fn move_async(&mut self, target_deg: f64) -> HwResult<()> {
        (**self).move_async(target_deg)
    }
    fn is_busy(&mut self) -> HwResult<bool> {
        (**self).is_busy()
    }
    fn current_position(&mut self) -> HwResult<f64> {
        (**self).current_position()
    }
}

impl<T: TriggerModule + ?Sized> TriggerModule for Box<T> {
    fn set_gate_start(&mut self, deg: f64) -> HwResult<()> {
        (**self).set_gate_start(deg)
    }
    fn set_gate_width(&mut self, deg: f64) -> HwResult<()> {
        (**self).set_gate_width(deg)
    }
    fn set_gate_step(&mut self, deg: f64) -> HwResult<()> {
        (**self).set_gate_step(deg)
    }
    fn arm(&mut self) -> HwResult<()> {
        (**self).arm()
    }
    fn disarm(&mut self) -> HwResult<()> {
        (**self).disarm()
    }
    fn is_armed(&mut self) -> HwResult<bool> {
        (**self).is_armed()
    }
}

/// Requested frame range is not (yet) available in the detector buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRangeError {
    pub start: usize,
    pub end: usize,
    pub available: usize,
}

impl std::fmt::Display for FrameRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames {}..{} requested but only {} available",
            self.start, self.end, self.available
        )
    }
}

impl std::error::Error for FrameRangeError {}
