//! Punch speed meter for an arm-mounted IMU.
//!
//! The user shakes the watch and holds still to arm the meter, then throws a
//! punch. The meter integrates forward acceleration into velocity and reports
//! the first velocity peak in km/h.
//!
//! The core (`gate`, `estimator`, `meter`, `sensor`, `gravity`) is portable
//! `no_std` code; board modules are only built with the `firmware` feature.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod estimator;
pub mod gate;
pub mod gravity;
pub mod meter;
pub mod qmi8658_imu;
pub mod sample;
pub mod sensor;
pub mod timer;

#[cfg(feature = "firmware")]
pub mod input;
#[cfg(feature = "firmware")]
pub mod wiring;

pub use config::{ConfigError, MeterConfig};
pub use estimator::{
    Callbacks, EstimatorState, Flow, SessionEnd, SessionObserver, SessionReport, SpeedEstimator,
    StartError,
};
pub use gate::{ArmingGate, GateStep};
pub use meter::{PunchMeter, Stage};
pub use sample::Sample;
pub use sensor::{AccelSource, LinearAccelerationSensor, SensorEvent};
