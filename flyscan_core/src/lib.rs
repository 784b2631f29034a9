#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Continuous ("fly") scan motion control for a Bragg monochromator.
//!
//! This crate is hardware-agnostic. The actuator, the position-compare
//! trigger module and the buffered detector are reached only through the
//! `flyscan_traits` capability traits.
//!
//! ## Architecture
//!
//! - **Conversion**: Bragg angle <-> photon energy (`bragg`)
//! - **Kinematics**: scan speed and run-up/run-down travel (`profile`)
//! - **Gating**: position-compare start/width/step (`gate`)
//! - **Sequencing**: prepare -> execute -> complete state machine (`controller`)
//! - **Orchestration**: one-call scan with cleanup on every path (`runner`)
//! - **Readback**: background motor position sampling (`monitor`)
//! - **Data**: detector frame reads tagged with energy (`frames`)
//!
//! Angles are signed degrees throughout; the only place that decides which
//! way "outward" points is `profile::extend_outward`.

pub mod bragg;
pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod frames;
pub mod gate;
pub mod hw_error;
pub mod mocks;
pub mod monitor;
pub mod profile;
pub mod runner;
pub mod status;
pub mod types;
pub mod util;

pub use builder::{FlyScan, FlyScanBuilder, Missing, Set, build_controller};
pub use config::{MotionCfg, PositioningCfg, RunUpCfg, Timeouts};
pub use controller::FlyScanController;
pub use error::{BuildError, HardwareFault, Result, ScanError};
pub use gate::GateConfig;
pub use profile::{MotionDirection, MotionPlan, MotionProfile};
pub use status::ScanPhase;
pub use types::{CrystalGeometry, EnergyRange};
