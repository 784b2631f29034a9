//! Simulated collaborators for the fly-scan controller.
//!
//! `SimulatedMotor`, `SimulatedTriggerModule` and `SimulatedDetector` share
//! state through cheap clones: the trigger module reads the motor as its
//! encoder and the detector buffers one frame per trigger pulse. Driving all
//! three from a `ManualClock` gives deterministic, sleep-free scans.
pub mod detector;
pub mod error;
pub mod motor;
pub mod trigger;
pub mod util;

pub use detector::SimulatedDetector;
pub use error::HwError;
pub use motor::{MotorFault, SimulatedMotor};
pub use trigger::SimulatedTriggerModule;

use flyscan_traits::Clock;

/// A motor, the trigger module watching it and the detector it triggers.
#[derive(Debug, Clone)]
pub struct SimulatedBeamline<C: Clock> {
    pub motor: SimulatedMotor<C>,
    pub trigger: SimulatedTriggerModule<C>,
    pub detector: SimulatedDetector<C>,
}

impl<C: Clock + Clone> SimulatedBeamline<C> {
    pub fn new(start_angle: f64, channels: usize, speed_scale: f64, clock: C) -> Self {
        let motor = SimulatedMotor::with_clock(start_angle, clock).with_speed_scale(speed_scale);
        let trigger = SimulatedTriggerModule::new(motor.clone());
        let detector = SimulatedDetector::new(trigger.clone(), channels);
        Self {
            motor,
            trigger,
            detector,
        }
    }
}
