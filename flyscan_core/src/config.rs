//! Runtime configuration for the fly-scan controller.
//!
//! These are the structs the controller consumes. They are separate from the
//! TOML-deserialized config in `flyscan_config`; `conversions` bridges the two.

use std::time::Duration;

/// Run-up sizing. The margin is
/// `max(scale * v² / (2 a), min_run_up_steps * |step|) + extra_run_up_deg`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunUpCfg {
    /// Angular acceleration of the actuator, deg/s².
    pub acceleration: f64,
    /// Multiplier on the ideal acceleration distance. Must be >= 1.0.
    pub scale_factor: f64,
    /// Lower bound on the margin, in scan steps. 0 disables the floor.
    pub min_run_up_steps: f64,
    /// Extra travel added on both ends, degrees.
    pub extra_run_up_deg: f64,
}

impl Default for RunUpCfg {
    fn default() -> Self {
        Self {
            acceleration: 0.225,
            scale_factor: 3.0,
            min_run_up_steps: 0.0,
            extra_run_up_deg: 0.0,
        }
    }
}

/// Motor limits and run-up sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCfg {
    /// Speed restored between scans and used for positioning moves, deg/s.
    pub max_speed: f64,
    pub run_up: RunUpCfg,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            max_speed: 0.5,
            run_up: RunUpCfg::default(),
        }
    }
}

/// In-position checking before the trigger is armed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositioningCfg {
    /// Wait for the run-up move to settle before arming.
    pub wait_for_run_up: bool,
    /// Approach the run-up position. When false the actuator is parked on the
    /// start angle and accelerates inside the gated region.
    pub use_run_up: bool,
    /// Sweep through to the run-down position. When false the sweep stops
    /// on the end angle.
    pub use_run_down: bool,
    /// Accept the run-up position when `|pos - demand| <= tolerance`, degrees.
    pub demand_tolerance: f64,
    /// Poll interval for every wait loop.
    pub poll_interval: Duration,
}

impl Default for PositioningCfg {
    fn default() -> Self {
        Self {
            wait_for_run_up: true,
            use_run_up: true,
            use_run_down: true,
            demand_tolerance: 0.000_11,
            poll_interval: Duration::from_millis(20),
        }
    }
}

/// Timeouts for waits the controller performs itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    /// Upper bound on the run-up settle wait in `execute`.
    pub in_position: Duration,
    /// Upper bound on `wait_for_run_down`.
    pub run_down: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            in_position: Duration::from_secs(60),
            run_down: Duration::from_secs(600),
        }
    }
}
